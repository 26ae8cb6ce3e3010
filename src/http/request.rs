//! Inbound request handling.
//!
//! # Responsibilities
//! - Generate a request ID for log correlation
//! - Buffer the request body within the configured limit
//! - Split the request into the parts the engine forwards
//!
//! # Design Decisions
//! - The request ID lives in the tracing span only; forwarded headers stay untouched

use axum::body::Body;
use axum::http::Request;
use uuid::Uuid;

use crate::proxy::InboundRequest;

/// Unique identifier attached to each request's log span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Buffer an axum request into an [`InboundRequest`].
pub async fn buffer_request(
    listen_port: u16,
    request: Request<Body>,
    max_body_bytes: usize,
) -> Result<InboundRequest, axum::Error> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, max_body_bytes).await?;

    Ok(InboundRequest {
        listen_port,
        method: parts.method,
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers: parts.headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }

    #[tokio::test]
    async fn test_buffer_request_splits_uri() {
        let request = Request::builder()
            .method("POST")
            .uri("http://proxy:9696/1/api?t=search&q=x")
            .header("X-Api-Key", "k")
            .body(Body::from("payload"))
            .unwrap();

        let inbound = buffer_request(9696, request, 1024).await.unwrap();
        assert_eq!(inbound.listen_port, 9696);
        assert_eq!(inbound.method, "POST");
        assert_eq!(inbound.path, "/1/api");
        assert_eq!(inbound.query.as_deref(), Some("t=search&q=x"));
        assert_eq!(inbound.headers["x-api-key"], "k");
        assert_eq!(inbound.body, "payload");
    }

    #[tokio::test]
    async fn test_buffer_request_enforces_limit() {
        let request = Request::builder()
            .uri("/")
            .body(Body::from(vec![0u8; 64]))
            .unwrap();
        assert!(buffer_request(80, request, 16).await.is_err());
    }
}
