//! The single value a proxied request produces.

use axum::body::Bytes;
use axum::http::{
    header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING},
    HeaderMap, HeaderValue, StatusCode,
};

/// The only failures the proxy answers with its own status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticError {
    NoUpstream,
    UpstreamTimeout,
    ProxyError,
}

impl SyntheticError {
    pub fn status(self) -> StatusCode {
        match self {
            SyntheticError::NoUpstream => StatusCode::SERVICE_UNAVAILABLE,
            SyntheticError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            SyntheticError::ProxyError => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            SyntheticError::NoUpstream => "No upstream configured",
            SyntheticError::UpstreamTimeout => "Upstream timeout",
            SyntheticError::ProxyError => "Proxy error",
        }
    }

    /// `{"error": "<message>"}`
    pub fn body(self) -> String {
        format!(r#"{{"error": "{}"}}"#, self.message())
    }
}

/// Status, headers and body returned to the client.
#[derive(Debug, Clone)]
pub struct ProxyOutcome {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Whether titles were rewritten (body is decoded text).
    pub rewritten: bool,
}

impl ProxyOutcome {
    pub fn synthetic(error: SyntheticError) -> Self {
        let body = error.body();
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        Self {
            status: error.status(),
            headers,
            body: Bytes::from(body),
            rewritten: false,
        }
    }

    /// Upstream response relayed as received.
    ///
    /// The body is already buffered, so chunked framing from the upstream
    /// no longer applies and `Transfer-Encoding` is dropped.
    pub fn passthrough(status: StatusCode, mut headers: HeaderMap, body: Bytes) -> Self {
        headers.remove(TRANSFER_ENCODING);
        Self {
            status,
            headers,
            body,
            rewritten: false,
        }
    }

    /// Replace the body with decoded, rewritten text and fix up framing headers.
    pub fn with_rewritten_body(mut self, body: String) -> Self {
        self.headers.remove(CONTENT_ENCODING);
        self.headers.remove(TRANSFER_ENCODING);
        self.headers.remove(CONTENT_LENGTH);
        self.headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        self.body = Bytes::from(body);
        self.rewritten = true;
        self
    }
}
