//! Proxy engine subsystem.
//!
//! # Data Flow
//! ```text
//! InboundRequest
//!     → engine.rs (route, forward over pooled client)
//!     → classify.rs (search request? XML response?)
//!     → codec.rs (undo Content-Encoding)
//!     → rewrite::ResultDocumentRewriter
//!     → outcome.rs (ProxyOutcome, synthetic errors)
//! ```

pub mod classify;
pub mod codec;
pub mod engine;
pub mod outcome;

pub use engine::{EngineSettings, InboundRequest, ProxyEngine, UpstreamError};
pub use outcome::{ProxyOutcome, SyntheticError};
