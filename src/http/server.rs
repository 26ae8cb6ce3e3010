//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Bind one listener per configured port
//! - Create the Axum Router (health endpoints, catch-all proxy)
//! - Wire up middleware (tracing)
//! - Hand buffered requests to the proxy engine
//! - Serve until shutdown, then release the upstream pool

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use futures_util::future::try_join_all;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::config::ProxyConfig;
use crate::http::health;
use crate::http::request::{buffer_request, RequestId};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::proxy::{ProxyEngine, ProxyOutcome, SyntheticError};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers. One per listener.
#[derive(Clone)]
pub struct AppState {
    pub listen_port: u16,
    pub engine: Arc<ProxyEngine>,
    pub max_request_body: usize,
}

/// HTTP server for the proxy.
pub struct HttpServer {
    config: ProxyConfig,
    engine: Arc<ProxyEngine>,
}

impl HttpServer {
    pub fn new(config: ProxyConfig, engine: Arc<ProxyEngine>) -> Self {
        Self { config, engine }
    }

    /// Bind a listener for every port in the configuration.
    pub async fn bind(&self) -> Result<Vec<TcpListener>, ServerError> {
        let mut listeners = Vec::new();
        for port in self.config.listen_ports() {
            let addr = format!("{}:{}", self.config.listener.bind_host, port);
            let listener = TcpListener::bind(&addr)
                .await
                .map_err(|source| ServerError::Bind { addr: addr.clone(), source })?;
            tracing::info!(address = %addr, "Listening for connections");
            listeners.push(listener);
        }
        Ok(listeners)
    }

    /// Build the Axum router with all middleware layers.
    pub fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(health::health))
            .route("/health/live", get(health::liveness))
            .route("/health/ready", get(health::readiness))
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Serve every listener until `shutdown` fires.
    ///
    /// Each listener's local port is the listen port its requests resolve with.
    pub async fn run(self, listeners: Vec<TcpListener>, shutdown: &Shutdown) -> Result<(), ServerError> {
        let mut servers = Vec::with_capacity(listeners.len());
        for listener in listeners {
            let listen_port = listener.local_addr()?.port();
            let app = Self::build_router(AppState {
                listen_port,
                engine: self.engine.clone(),
                max_request_body: self.config.limits.max_request_body_bytes,
            });
            let mut stop = shutdown.subscribe();

            servers.push(async move {
                tracing::info!(listen_port, "HTTP server starting");
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = stop.recv().await;
                    })
                    .await
            });
        }

        try_join_all(servers).await?;
        tracing::info!("HTTP server stopped");

        // Last handle to the engine: dropping it closes pooled upstream connections.
        drop(self.engine);
        tracing::info!("Upstream connection pool released");
        Ok(())
    }
}

/// Catch-all handler: buffer, proxy, respond.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = RequestId::new();
    let method = request.method().to_string();
    let span = tracing::info_span!(
        "proxy",
        request_id = %request_id,
        method = %method,
        path = %request.uri().path(),
        listen_port = state.listen_port
    );

    async move {
        let inbound = match buffer_request(state.listen_port, request, state.max_request_body).await {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read request body");
                metrics::record_request(&method, 502, false, start);
                return ProxyOutcome::synthetic(SyntheticError::ProxyError).into_response();
            }
        };

        let outcome = state.engine.handle(inbound).await;
        tracing::info!(
            status = outcome.status.as_u16(),
            rewritten = outcome.rewritten,
            bytes = outcome.body.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Request completed"
        );
        metrics::record_request(&method, outcome.status.as_u16(), outcome.rewritten, start);
        outcome.into_response()
    }
    .instrument(span)
    .await
}
