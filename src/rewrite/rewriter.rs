//! Search result title rewriting.
//!
//! # Responsibilities
//! - Extract every result title (and its category) from a document
//! - Normalize all of them as one batch
//! - Splice changed titles back in by offset
//!
//! # Design Decisions
//! - Fail-open: any problem yields the input document unchanged
//! - No document → no oracle traffic: zero entries skip the normalizer
//! - Splicing runs from the last span to the first so offsets stay valid

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;
use thiserror::Error;

use crate::config::RewriteConfig;
use crate::normalize::{NormalizationClient, NormalizationRequest, META_CATEGORY};
use crate::observability::metrics;
use crate::rewrite::document::DocumentPatterns;

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("invalid element pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

pub struct ResultDocumentRewriter {
    patterns: DocumentPatterns,
    normalizer: Arc<NormalizationClient>,
}

impl ResultDocumentRewriter {
    pub fn new(
        config: &RewriteConfig,
        normalizer: Arc<NormalizationClient>,
    ) -> Result<Self, RewriteError> {
        let patterns = DocumentPatterns::compile(&config.item_element, &config.title_element)?;
        Ok(Self { patterns, normalizer })
    }

    pub async fn rewrite(&self, document: &str) -> String {
        self.rewrite_with(document, &BTreeMap::new()).await
    }

    /// Rewrite titles, attaching `extra` to every title's metadata.
    ///
    /// An entry's own metadata (its category) wins over `extra` on key clashes.
    pub async fn rewrite_with(&self, document: &str, extra: &BTreeMap<String, String>) -> String {
        let entries = self.patterns.entries(document);
        if entries.is_empty() {
            tracing::debug!("No result entries found, document left as-is");
            return document.to_string();
        }

        let requests: Vec<NormalizationRequest> = entries
            .iter()
            .map(|entry| {
                let mut request = NormalizationRequest::new(entry.title.raw_title.clone());
                if let Some(category) = &entry.category {
                    request.metadata.insert(META_CATEGORY.to_string(), category.clone());
                }
                for (key, value) in extra {
                    request
                        .metadata
                        .entry(key.clone())
                        .or_insert_with(|| value.clone());
                }
                request
            })
            .collect();

        let normalized = self.normalizer.normalize_batch(&requests).await;
        if normalized.len() != entries.len() {
            tracing::warn!(
                entries = entries.len(),
                results = normalized.len(),
                "Normalizer returned a mismatched batch, document left as-is"
            );
            return document.to_string();
        }

        let substitutions: Vec<(Range<usize>, String)> = entries
            .iter()
            .zip(&normalized)
            .filter(|(entry, title)| entry.title.raw_title != **title)
            .map(|(entry, title)| (entry.title.range.clone(), entry.title.encode(title)))
            .collect();

        let changed = substitutions.len();
        metrics::record_titles(changed, entries.len() - changed);
        tracing::info!(titles = entries.len(), changed, "Rewrote search results");

        splice(document, substitutions)
    }
}

/// Replace each range with its text. Overlapping or out-of-bounds ranges are skipped.
pub fn splice(document: &str, mut substitutions: Vec<(Range<usize>, String)>) -> String {
    substitutions.sort_by(|a, b| b.0.start.cmp(&a.0.start));

    let mut out = document.to_string();
    let mut floor = document.len();
    for (range, replacement) in substitutions {
        if range.start > range.end
            || range.end > floor
            || !document.is_char_boundary(range.start)
            || !document.is_char_boundary(range.end)
        {
            tracing::warn!(start = range.start, end = range.end, "Skipping invalid title span");
            continue;
        }
        floor = range.start;
        out.replace_range(range, &replacement);
    }
    out
}
