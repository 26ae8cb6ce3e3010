//! Request forwarding and conditional response rewriting.
//!
//! # Responsibilities
//! - Resolve the upstream for each request
//! - Forward method, path, query, headers (minus `Host`) and body
//! - Map upstream timeouts and transport failures to synthetic responses
//! - Rewrite search responses, pass everything else through
//!
//! # Design Decisions
//! - One pooled client for the whole process
//! - The upstream deadline covers the response head and body
//! - A connect timeout is a timeout too (504), whichever deadline fires first
//! - Upstream status codes are never altered

use axum::body::{Body, Bytes};
use axum::http::{header::CONTENT_ENCODING, header::HOST, HeaderMap, Method, Request, StatusCode, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::validation::MAX_UPSTREAM_SECS;
use crate::config::ProxyConfig;
use crate::observability::metrics;
use crate::proxy::classify::{is_xml_response, SearchClassifier};
use crate::proxy::codec::decode_body;
use crate::proxy::outcome::{ProxyOutcome, SyntheticError};
use crate::rewrite::ResultDocumentRewriter;
use crate::routing::{forwarded_port, Router};

/// Failures talking to the upstream.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream did not answer within {0:?}")]
    Timeout(Duration),

    #[error("invalid upstream target: {0}")]
    InvalidTarget(String),

    #[error("upstream transport error: {0}")]
    Transport(String),
}

impl UpstreamError {
    fn synthetic(&self) -> SyntheticError {
        match self {
            UpstreamError::Timeout(_) => SyntheticError::UpstreamTimeout,
            UpstreamError::InvalidTarget(_) | UpstreamError::Transport(_) => {
                SyntheticError::ProxyError
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Timeout(_) => "timeout",
            UpstreamError::InvalidTarget(_) => "invalid_target",
            UpstreamError::Transport(_) => "transport",
        }
    }
}

/// An inbound request, fully buffered.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub listen_port: u16,
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Tunables the engine takes from `ProxyConfig`.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub connect_timeout: Duration,
    pub upstream_timeout: Duration,
    pub pool_idle_timeout: Duration,
    pub max_response_body: usize,
}

impl EngineSettings {
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(config.timeouts.connect_secs),
            upstream_timeout: Duration::try_from_secs_f64(config.timeouts.upstream_secs)
                .unwrap_or(Duration::from_secs_f64(MAX_UPSTREAM_SECS)),
            pool_idle_timeout: Duration::from_secs(config.timeouts.pool_idle_secs),
            max_response_body: config.limits.max_response_body_bytes,
        }
    }
}

pub struct ProxyEngine {
    router: Router,
    client: Client<HttpConnector, Body>,
    classifier: SearchClassifier,
    rewriter: Option<Arc<ResultDocumentRewriter>>,
    settings: EngineSettings,
}

impl ProxyEngine {
    pub fn new(
        router: Router,
        classifier: SearchClassifier,
        rewriter: Option<Arc<ResultDocumentRewriter>>,
        settings: EngineSettings,
    ) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(settings.connect_timeout));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(settings.pool_idle_timeout)
            .build(connector);

        if router.is_empty() {
            tracing::warn!("No routes configured; every proxied request will receive 503");
        }
        tracing::info!(
            routes = router.len(),
            rewriting = rewriter.is_some(),
            upstream_timeout = ?settings.upstream_timeout,
            "Proxy engine initialized"
        );

        Self {
            router,
            client,
            classifier,
            rewriter,
            settings,
        }
    }

    /// Build an engine from configuration. `rewriter` is `None` when the
    /// normalizer is disabled.
    pub fn from_config(config: &ProxyConfig, rewriter: Option<Arc<ResultDocumentRewriter>>) -> Self {
        Self::new(
            Router::new(config.route_table()),
            SearchClassifier::new(&config.rewrite),
            rewriter,
            EngineSettings::from_config(config),
        )
    }

    pub async fn handle(&self, request: InboundRequest) -> ProxyOutcome {
        let upstream = match self
            .router
            .resolve(request.listen_port, forwarded_port(&request.headers))
        {
            Ok(upstream) => upstream,
            Err(e) => {
                tracing::warn!(listen_port = request.listen_port, error = %e, "No route for request");
                metrics::record_upstream_error("no_upstream");
                return ProxyOutcome::synthetic(SyntheticError::NoUpstream);
            }
        };

        let target = target_url(upstream, &request.path, request.query.as_deref());
        tracing::debug!(method = %request.method, target = %target, "Forwarding request");

        let (status, headers, body) = match self.forward(&request, &target).await {
            Ok(response) => response,
            Err(e) => {
                match &e {
                    UpstreamError::Timeout(_) => {
                        tracing::error!(target = %target, error = %e, "Request to upstream timed out")
                    }
                    _ => tracing::error!(target = %target, error = %e, "Proxy request failed"),
                }
                metrics::record_upstream_error(e.kind());
                return ProxyOutcome::synthetic(e.synthetic());
            }
        };

        let outcome = ProxyOutcome::passthrough(status, headers, body);
        match &self.rewriter {
            Some(rewriter)
                if self
                    .classifier
                    .is_search_request(&request.path, request.query.as_deref())
                    && is_xml_response(&outcome.headers) =>
            {
                self.rewrite(rewriter, outcome, request.query.as_deref()).await
            }
            _ => outcome,
        }
    }

    async fn forward(
        &self,
        request: &InboundRequest,
        target: &str,
    ) -> Result<(StatusCode, HeaderMap, Bytes), UpstreamError> {
        let uri: Uri = target
            .parse()
            .map_err(|e: axum::http::uri::InvalidUri| UpstreamError::InvalidTarget(e.to_string()))?;

        let mut builder = Request::builder().method(request.method.clone()).uri(uri);
        if let Some(headers) = builder.headers_mut() {
            for (name, value) in request.headers.iter() {
                if *name != HOST {
                    headers.append(name.clone(), value.clone());
                }
            }
        }
        let outbound = builder
            .body(Body::from(request.body.clone()))
            .map_err(|e| UpstreamError::InvalidTarget(e.to_string()))?;

        let exchange = async {
            let response = self
                .client
                .request(outbound)
                .await
                .map_err(|e| {
                    if e.is_connect() && is_timed_out(&e) {
                        UpstreamError::Timeout(self.settings.connect_timeout)
                    } else {
                        UpstreamError::Transport(format!("{e:?}"))
                    }
                })?;
            let (parts, body) = response.into_parts();
            let bytes = axum::body::to_bytes(Body::new(body), self.settings.max_response_body)
                .await
                .map_err(|e| UpstreamError::Transport(e.to_string()))?;
            Ok::<_, UpstreamError>((parts.status, parts.headers, bytes))
        };

        tokio::time::timeout(self.settings.upstream_timeout, exchange)
            .await
            .map_err(|_| UpstreamError::Timeout(self.settings.upstream_timeout))?
    }

    /// Decode, rewrite, re-frame. Any decoding problem returns `outcome` untouched.
    async fn rewrite(
        &self,
        rewriter: &ResultDocumentRewriter,
        outcome: ProxyOutcome,
        query: Option<&str>,
    ) -> ProxyOutcome {
        let encoding = outcome
            .headers
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let decoded = match decode_body(&outcome.body, encoding.as_deref(), self.settings.max_response_body) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(error = %e, "Could not decode search response, passing through");
                return outcome;
            }
        };
        let text = match String::from_utf8(decoded) {
            Ok(text) => text,
            Err(_) => {
                tracing::warn!("Search response is not UTF-8, passing through");
                return outcome;
            }
        };

        let metadata = self.classifier.request_metadata(query);
        let rewritten = rewriter.rewrite_with(&text, &metadata).await;
        outcome.with_rewritten_body(rewritten)
    }
}

/// `base + path [+ "?" + query]`.
/// True when any error in the source chain is an I/O timeout.
fn is_timed_out(error: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(e) = current {
        if e
            .downcast_ref::<std::io::Error>()
            .is_some_and(|io| io.kind() == std::io::ErrorKind::TimedOut)
        {
            return true;
        }
        current = e.source();
    }
    false
}

pub fn target_url(upstream: &str, path: &str, query: Option<&str>) -> String {
    let base = upstream.trim_end_matches('/');
    match query {
        Some(q) if !q.is_empty() => format!("{base}{path}?{q}"),
        _ => format!("{base}{path}"),
    }
}
