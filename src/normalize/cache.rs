//! Normalized title cache.

use dashmap::DashMap;

use crate::observability::metrics;

/// A thread-safe cache of normalized titles.
///
/// Entries live for the process lifetime. Owned by one `NormalizationClient`
/// and shared with it through an `Arc`.
#[derive(Debug, Default)]
pub struct NormalizationCache {
    inner: DashMap<String, String>,
}

impl NormalizationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).map(|r| r.value().clone())
    }

    pub fn insert(&self, key: String, normalized: String) {
        self.inner.insert(key, normalized);
        metrics::record_cache_size(self.inner.len());
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.inner.clear();
        metrics::record_cache_size(0);
        tracing::info!("Normalization cache cleared");
    }
}
