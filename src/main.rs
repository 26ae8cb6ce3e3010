//! Title-rewriting reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │              TITLE REWRITE PROXY              │
//!     Client Request     │  ┌─────────┐   ┌─────────┐   ┌───────────┐   │
//!     ───────────────────┼─▶│ http    │──▶│ routing │──▶│  proxy    │───┼──▶ Upstream
//!                        │  │ server  │   │ (port)  │   │  engine   │   │    indexer
//!                        │  └─────────┘   └─────────┘   └─────┬─────┘   │
//!                        │                                    │         │
//!     Client Response    │  ┌─────────┐   ┌──────────┐  ┌─────▼─────┐   │
//!     ◀──────────────────┼──│response │◀──│ rewrite  │◀─│  codec    │◀──┼─── Response
//!                        │  └─────────┘   └────┬─────┘  └───────────┘   │
//!                        │                     │                        │
//!                        │               ┌─────▼──────┐                 │
//!                        │               │ normalize  │─────────────────┼──▶ LLM oracle
//!                        │               │ (+ cache)  │                 │
//!                        │               └────────────┘                 │
//!                        │  config · observability · lifecycle          │
//!                        └──────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use title_rewrite_proxy::config::{self, ProxyConfig};
use title_rewrite_proxy::lifecycle::{self, Shutdown};
use title_rewrite_proxy::normalize::{ChatCompletionsOracle, NormalizationCache, NormalizationClient};
use title_rewrite_proxy::observability::{logging, metrics};
use title_rewrite_proxy::rewrite::ResultDocumentRewriter;
use title_rewrite_proxy::{HttpServer, ProxyEngine};

#[derive(Parser, Debug)]
#[command(name = "title-rewrite-proxy", version, about = "Reverse proxy that normalizes release titles in indexer search results")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = config::load_config(args.config.as_deref())?;
    if args.check {
        println!("Configuration OK ({} routes)", config.routes.len());
        return Ok(());
    }

    logging::init(&config.observability);
    tracing::info!("title-rewrite-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    for (port, upstream) in config.route_table() {
        tracing::info!(port, upstream = %upstream, "Route configured");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let rewriter = build_rewriter(&config)?;
    let engine = Arc::new(ProxyEngine::from_config(&config, rewriter));

    let server = HttpServer::new(config, engine);
    let listeners = server.bind().await?;

    let shutdown = Arc::new(Shutdown::new());
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        lifecycle::wait_for_signal().await;
        tracing::info!("Shutdown signal received, draining connections");
        trigger.trigger();
    });

    server.run(listeners, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Assemble the normalization pipeline, or `None` when it is disabled.
fn build_rewriter(
    config: &ProxyConfig,
) -> Result<Option<Arc<ResultDocumentRewriter>>, Box<dyn std::error::Error>> {
    let normalizer = &config.normalizer;
    if !normalizer.enabled {
        tracing::info!("Title normalization disabled; proxying unchanged");
        return Ok(None);
    }

    let oracle = Arc::new(ChatCompletionsOracle::new(normalizer)?);
    let cache = Arc::new(NormalizationCache::new());
    if let Err(e) = lifecycle::clear_cache_on_hangup(cache.clone()) {
        tracing::warn!(error = %e, "Failed to install SIGHUP handler, cache cannot be cleared at runtime");
    }
    let client = NormalizationClient::new(oracle, cache, normalizer.cache_key)
        .with_carry_suffixes(normalizer.carry_suffixes.clone());
    let rewriter = ResultDocumentRewriter::new(&config.rewrite, Arc::new(client))?;

    tracing::info!(
        model = %normalizer.model,
        base_url = %normalizer.base_url,
        cache_key = ?normalizer.cache_key,
        "Title normalization enabled"
    );
    Ok(Some(Arc::new(rewriter)))
}
