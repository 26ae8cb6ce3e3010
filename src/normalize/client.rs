//! Cached, batched access to the normalization oracle.
//!
//! # Responsibilities
//! - Serve repeated titles from the cache
//! - Fan out cache misses of one batch concurrently
//! - Fall back to the raw title whenever the oracle fails
//!
//! # Design Decisions
//! - Failures are never cached, so the next request retries
//! - Duplicate keys within one batch share a single oracle call
//! - Concurrent batches may race on the same key; the later insert wins

use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::CacheKeyMode;
use crate::normalize::cache::NormalizationCache;
use crate::normalize::oracle::{OracleError, TitleOracle};
use crate::normalize::types::NormalizationRequest;
use crate::observability::metrics;

pub struct NormalizationClient {
    oracle: Arc<dyn TitleOracle>,
    cache: Arc<NormalizationCache>,
    key_mode: CacheKeyMode,
    carry_suffixes: Vec<String>,
}

impl NormalizationClient {
    pub fn new(
        oracle: Arc<dyn TitleOracle>,
        cache: Arc<NormalizationCache>,
        key_mode: CacheKeyMode,
    ) -> Self {
        Self {
            oracle,
            cache,
            key_mode,
            carry_suffixes: Vec::new(),
        }
    }

    /// Tokens re-attached as `[TOKEN]` when the raw title ends with them.
    pub fn with_carry_suffixes(mut self, suffixes: Vec<String>) -> Self {
        self.carry_suffixes = suffixes
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    pub fn cache(&self) -> &Arc<NormalizationCache> {
        &self.cache
    }

    /// Normalize one title. Returns the raw title if the oracle fails.
    pub async fn normalize(&self, request: &NormalizationRequest) -> String {
        let key = request.cache_key(self.key_mode);
        if let Some(hit) = self.cache.get(&key) {
            metrics::record_cache_hit();
            return hit;
        }
        self.fetch(request, key).await
    }

    /// Normalize a batch. Output `i` belongs to `requests[i]`.
    pub async fn normalize_batch(&self, requests: &[NormalizationRequest]) -> Vec<String> {
        let mut outputs: Vec<Option<String>> = vec![None; requests.len()];
        // Unique misses in first-seen order, each with every position it fills.
        let mut misses: Vec<(String, Vec<usize>)> = Vec::new();
        let mut miss_index: HashMap<String, usize> = HashMap::new();

        for (position, request) in requests.iter().enumerate() {
            let key = request.cache_key(self.key_mode);
            if let Some(hit) = self.cache.get(&key) {
                metrics::record_cache_hit();
                outputs[position] = Some(hit);
                continue;
            }
            match miss_index.get(&key) {
                Some(&slot) => misses[slot].1.push(position),
                None => {
                    miss_index.insert(key.clone(), misses.len());
                    misses.push((key, vec![position]));
                }
            }
        }

        tracing::debug!(
            titles = requests.len(),
            misses = misses.len(),
            "Normalizing batch"
        );

        let fetched = join_all(
            misses
                .iter()
                .map(|(key, positions)| self.fetch(&requests[positions[0]], key.clone())),
        )
        .await;

        for ((_, positions), normalized) in misses.into_iter().zip(fetched) {
            for position in positions {
                outputs[position] = Some(normalized.clone());
            }
        }

        outputs
            .into_iter()
            .zip(requests)
            .map(|(output, request)| output.unwrap_or_else(|| request.raw_title.clone()))
            .collect()
    }

    async fn fetch(&self, request: &NormalizationRequest, key: String) -> String {
        let result = self
            .oracle
            .normalize(request)
            .await
            .and_then(|raw| {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    Err(OracleError::Empty)
                } else {
                    Ok(trimmed.to_string())
                }
            });

        match result {
            Ok(normalized) => {
                let normalized = self.carry_suffixes(&request.raw_title, normalized);
                metrics::record_normalizer_call("ok");
                tracing::info!(
                    raw = %truncate(&request.raw_title, 80),
                    normalized = %normalized,
                    "Title normalized"
                );
                self.cache.insert(key, normalized.clone());
                normalized
            }
            Err(e) => {
                metrics::record_normalizer_call(match e {
                    OracleError::Empty => "empty",
                    _ => "error",
                });
                tracing::warn!(
                    raw = %truncate(&request.raw_title, 50),
                    error = %e,
                    "Normalization failed, keeping raw title"
                );
                request.raw_title.clone()
            }
        }
    }

    fn carry_suffixes(&self, raw_title: &str, mut normalized: String) -> String {
        let raw_upper = raw_title.trim_end().to_uppercase();
        for token in &self.carry_suffixes {
            let marker = format!("[{}]", token);
            if raw_upper.ends_with(&token.to_uppercase()) && !normalized.contains(&marker) {
                normalized.push_str(&marker);
            }
        }
        normalized
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
