//! Search result rewriting subsystem.
//!
//! # Data Flow
//! ```text
//! Decoded response text
//!     → document.rs (locate items, title spans, categories)
//!     → rewriter.rs (batch normalize, splice changed titles)
//!     → Rewritten text (bytes outside title spans untouched)
//! ```

pub mod document;
pub mod rewriter;

pub use document::{DocumentPatterns, ResultEntry, TitleSpan, TitleSyntax};
pub use rewriter::{ResultDocumentRewriter, RewriteError};
