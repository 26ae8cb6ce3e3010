//! Title-rewriting reverse proxy library.
//!
//! Forwards traffic from each listen port to its upstream indexer and, for
//! search requests, replaces release titles in XML result documents with
//! normalized ones obtained from a language-model oracle.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod normalize;
pub mod observability;
pub mod proxy;
pub mod rewrite;
pub mod routing;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use proxy::ProxyEngine;
