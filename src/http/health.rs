//! Liveness and readiness endpoints.
//!
//! Registered ahead of the catch-all proxy route, so they are never forwarded.

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

/// Liveness: the process is up.
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Readiness: the process accepts traffic.
pub async fn readiness() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ready" })
}
