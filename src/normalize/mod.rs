//! Title normalization subsystem.
//!
//! # Data Flow
//! ```text
//! NormalizationRequest[] (one document)
//!     → client.rs (cache lookup per key)
//!     → oracle.rs (concurrent calls for the misses)
//!     → cache.rs (store successes)
//!     → normalized titles, same order as the input
//! ```

pub mod cache;
pub mod client;
pub mod oracle;
pub mod types;

pub use cache::NormalizationCache;
pub use client::NormalizationClient;
pub use oracle::{ChatCompletionsOracle, OracleError, TitleOracle};
pub use types::{NormalizationRequest, META_CATEGORY, META_QUERY};
