//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT (Ctrl-C) or SIGTERM
//! - Return once, so the caller can trigger graceful shutdown
//! - SIGHUP clears the normalization cache, not shutdown
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A failed handler registration is logged and that signal is ignored

use std::sync::Arc;

use crate::normalize::NormalizationCache;

/// Resolve when the process is asked to stop.
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}

/// Clear `cache` on every SIGHUP for the rest of the process lifetime.
///
/// The handler is installed before this returns.
#[cfg(unix)]
pub fn clear_cache_on_hangup(
    cache: Arc<NormalizationCache>,
) -> std::io::Result<tokio::task::JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangups = signal(SignalKind::hangup())?;
    Ok(tokio::spawn(async move {
        while hangups.recv().await.is_some() {
            tracing::info!(entries = cache.len(), "Received SIGHUP");
            cache.clear();
        }
    }))
}

/// SIGHUP does not exist here; the cache is only cleared by restarting.
#[cfg(not(unix))]
pub fn clear_cache_on_hangup(
    cache: Arc<NormalizationCache>,
) -> std::io::Result<tokio::task::JoinHandle<()>> {
    Ok(tokio::spawn(async move { drop(cache) }))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_hangup_clears_cache() {
        let cache = Arc::new(NormalizationCache::new());
        cache.insert("raw".into(), "Normalized".into());
        let _task = clear_cache_on_hangup(cache.clone()).unwrap();

        let status = std::process::Command::new("kill")
            .args(["-HUP", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        for _ in 0..100 {
            if cache.is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("cache was not cleared after SIGHUP");
    }
}
