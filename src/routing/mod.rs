//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (listen port, X-Forwarded-Port)
//!     → router.rs (port lookup)
//!     → Return: upstream base URL, first route, or NoUpstreamConfigured
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → port-keyed BTreeMap
//!     → Freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Deterministic: same input always resolves to the same upstream

pub mod router;

pub use router::{forwarded_port, Router, RoutingError, X_FORWARDED_PORT};
