//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (one listener per configured port)
//!     → server.rs (Axum setup, health routes, catch-all)
//!     → request.rs (request ID, buffer body)
//!     → proxy::ProxyEngine (route, forward, rewrite)
//!     → response.rs (ProxyOutcome → Response)
//!     → Send to client
//! ```

pub mod health;
pub mod request;
pub mod response;
pub mod server;

pub use request::{buffer_request, RequestId};
pub use server::{AppState, HttpServer, ServerError};
