//! Normalization request types.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::CacheKeyMode;

/// Metadata key for an entry's result category.
pub const META_CATEGORY: &str = "category";
/// Metadata key for the search query the client sent.
pub const META_QUERY: &str = "query";

/// One title to normalize, plus whatever context travels with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizationRequest {
    pub raw_title: String,
    pub metadata: BTreeMap<String, String>,
}

impl NormalizationRequest {
    pub fn new(raw_title: impl Into<String>) -> Self {
        Self {
            raw_title: raw_title.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Deterministic cache key for this request under `mode`.
    pub fn cache_key(&self, mode: CacheKeyMode) -> String {
        match mode {
            CacheKeyMode::Title => self.raw_title.clone(),
            // BTreeMap serializes in key order, so equal requests give equal keys.
            CacheKeyMode::TitleAndMetadata => {
                serde_json::to_string(self).unwrap_or_else(|_| self.raw_title.clone())
            }
        }
    }

    /// Render the request as the oracle's user prompt.
    ///
    /// ```text
    /// Title: <raw title>
    /// Category: 5070
    /// Query: golden kamuy
    /// ```
    pub fn to_prompt(&self) -> String {
        let mut lines = vec![format!("Title: {}", self.raw_title)];
        for (key, value) in &self.metadata {
            if value.trim().is_empty() {
                continue;
            }
            lines.push(format!("{}: {}", capitalize(key), value));
        }
        lines.join("\n")
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_modes() {
        let plain = NormalizationRequest::new("Show S01");
        let tagged = NormalizationRequest::new("Show S01").with_metadata(META_CATEGORY, "5070");

        assert_eq!(plain.cache_key(CacheKeyMode::Title), tagged.cache_key(CacheKeyMode::Title));
        assert_ne!(
            plain.cache_key(CacheKeyMode::TitleAndMetadata),
            tagged.cache_key(CacheKeyMode::TitleAndMetadata)
        );
    }

    #[test]
    fn test_metadata_key_is_order_independent() {
        let a = NormalizationRequest::new("x")
            .with_metadata("query", "q")
            .with_metadata("category", "c");
        let b = NormalizationRequest::new("x")
            .with_metadata("category", "c")
            .with_metadata("query", "q");
        assert_eq!(
            a.cache_key(CacheKeyMode::TitleAndMetadata),
            b.cache_key(CacheKeyMode::TitleAndMetadata)
        );
    }

    #[test]
    fn test_prompt_rendering() {
        let request = NormalizationRequest::new("Naruto [TV] [720p]")
            .with_metadata(META_QUERY, "Naruto")
            .with_metadata(META_CATEGORY, "5070")
            .with_metadata("empty", " ");
        assert_eq!(
            request.to_prompt(),
            "Title: Naruto [TV] [720p]\nCategory: 5070\nQuery: Naruto"
        );
    }
}
