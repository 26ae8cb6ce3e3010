//! Response handling.
//!
//! # Responsibilities
//! - Turn a `ProxyOutcome` into the response sent to the client
//!
//! # Design Decisions
//! - Status, headers and body are emitted exactly as the engine decided

use axum::body::Body;
use axum::response::{IntoResponse, Response};

use crate::proxy::ProxyOutcome;

impl IntoResponse for ProxyOutcome {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
