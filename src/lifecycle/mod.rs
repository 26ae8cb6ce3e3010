//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain in-flight requests → Release pool
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Clear the normalization cache
//! ```
//!
//! # Design Decisions
//! - Ordered startup (main.rs): config, logging, metrics, engine, listeners
//! - Listeners bind last, so traffic arrives only when the engine is ready

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::{clear_cache_on_hangup, wait_for_signal};
