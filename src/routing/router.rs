//! Port-based upstream lookup.
//!
//! # Responsibilities
//! - Store the listen port → upstream table
//! - Honor `X-Forwarded-Port` from a front proxy
//! - Fall back to the first configured route on a miss
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - BTreeMap so "first route" is the smallest port, always the same one
//! - Availability over precision: an unmapped port still gets an upstream

use axum::http::HeaderMap;
use std::collections::BTreeMap;
use thiserror::Error;

/// Header a front proxy uses to report the port the client originally hit.
pub const X_FORWARDED_PORT: &str = "x-forwarded-port";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("no upstream configured")]
    NoUpstreamConfigured,
}

/// Resolves inbound requests to upstream base URLs.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: BTreeMap<u16, String>,
}

impl Router {
    /// Build a router from a port → upstream table.
    ///
    /// Trailing slashes are trimmed so paths can be appended directly.
    pub fn new(routes: BTreeMap<u16, String>) -> Self {
        let routes = routes
            .into_iter()
            .map(|(port, upstream)| (port, upstream.trim_end_matches('/').to_string()))
            .collect();
        Self { routes }
    }

    /// Resolve the upstream for a request received on `listen_port`.
    pub fn resolve(
        &self,
        listen_port: u16,
        forwarded_port: Option<u16>,
    ) -> Result<&str, RoutingError> {
        let port = forwarded_port.unwrap_or(listen_port);
        if let Some(upstream) = self.routes.get(&port) {
            return Ok(upstream);
        }

        let (fallback_port, upstream) = self
            .routes
            .iter()
            .next()
            .ok_or(RoutingError::NoUpstreamConfigured)?;

        tracing::debug!(
            port,
            fallback_port = *fallback_port,
            upstream = %upstream,
            "Port not mapped, using first configured route"
        );
        Ok(upstream)
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }
}

/// Parse `X-Forwarded-Port`, ignoring absent or malformed values.
pub fn forwarded_port(headers: &HeaderMap) -> Option<u16> {
    headers
        .get(X_FORWARDED_PORT)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn two_backends() -> Router {
        Router::new(BTreeMap::from([
            (9696, "http://backend-a".to_string()),
            (9697, "http://backend-b/".to_string()),
        ]))
    }

    #[test]
    fn test_listen_port_lookup() {
        let router = two_backends();
        assert_eq!(router.resolve(9697, None), Ok("http://backend-b"));
        assert_eq!(router.resolve(9696, None), Ok("http://backend-a"));
    }

    #[test]
    fn test_forwarded_port_takes_precedence() {
        let router = two_backends();
        assert_eq!(router.resolve(9697, Some(9696)), Ok("http://backend-a"));
    }

    #[test]
    fn test_unmapped_port_falls_back_to_smallest() {
        let router = two_backends();
        assert_eq!(router.resolve(8080, None), Ok("http://backend-a"));
        assert_eq!(router.resolve(9697, Some(1234)), Ok("http://backend-a"));
    }

    #[test]
    fn test_empty_table_fails() {
        let router = Router::default();
        assert_eq!(
            router.resolve(9696, None),
            Err(RoutingError::NoUpstreamConfigured)
        );
        assert_eq!(
            router.resolve(9696, Some(9697)),
            Err(RoutingError::NoUpstreamConfigured)
        );
    }

    #[test]
    fn test_forwarded_port_header_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(forwarded_port(&headers), None);

        headers.insert(X_FORWARDED_PORT, HeaderValue::from_static("9696"));
        assert_eq!(forwarded_port(&headers), Some(9696));

        headers.insert(X_FORWARDED_PORT, HeaderValue::from_static(" 443, 80"));
        assert_eq!(forwarded_port(&headers), Some(443));

        headers.insert(X_FORWARDED_PORT, HeaderValue::from_static("https"));
        assert_eq!(forwarded_port(&headers), None);
    }
}
