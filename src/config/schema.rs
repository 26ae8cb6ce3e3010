//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind host, extra ports).
    pub listener: ListenerConfig,

    /// Listen port to upstream mappings.
    pub routes: Vec<RouteConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Body size limits.
    pub limits: LimitsConfig,

    /// Search response detection and title extraction.
    pub rewrite: RewriteConfig,

    /// Normalization oracle settings.
    pub normalizer: NormalizerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ProxyConfig {
    /// Route table keyed by listen port.
    pub fn route_table(&self) -> BTreeMap<u16, String> {
        self.routes
            .iter()
            .map(|r| (r.port, r.upstream.clone()))
            .collect()
    }

    /// Every port the server should accept connections on, ascending.
    pub fn listen_ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self
            .routes
            .iter()
            .map(|r| r.port)
            .chain(self.listener.extra_ports.iter().copied())
            .collect();
        ports.sort_unstable();
        ports.dedup();
        if ports.is_empty() {
            ports.push(self.listener.default_port);
        }
        ports
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Host (interface) every listener binds on.
    pub bind_host: String,

    /// Ports accepted in addition to the route ports.
    pub extra_ports: Vec<u16>,

    /// Port used when neither routes nor extra ports are configured.
    pub default_port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            extra_ports: Vec::new(),
            default_port: 8080,
        }
    }
}

/// A single listen port to upstream mapping.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RouteConfig {
    /// Inbound listen port.
    pub port: u16,

    /// Upstream base URL (e.g., "http://prowlarr:9696").
    pub upstream: String,
}

/// Timeout configuration for upstream traffic.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Deadline for the whole upstream exchange (head and body), in seconds.
    pub upstream_secs: f64,

    /// How long an idle pooled connection is kept, in seconds.
    pub pool_idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            upstream_secs: 60.0,
            pool_idle_secs: 90,
        }
    }
}

/// Body buffering limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_request_body_bytes: usize,
    pub max_response_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_body_bytes: 10 * 1024 * 1024,
            max_response_body_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Which responses are rewritten and where titles live in them.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Substring the request path must contain (e.g., "/api").
    pub search_path_marker: String,

    /// Query parameter naming the operation.
    pub search_param: String,

    /// Operation values that mark a search.
    pub search_types: Vec<String>,

    /// Element delimiting one result entry.
    pub item_element: String,

    /// Element holding an entry's title.
    pub title_element: String,

    /// Attach the request's `q` parameter to each title as `query` metadata.
    pub include_query_metadata: bool,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            search_path_marker: "/api".to_string(),
            search_param: "t".to_string(),
            search_types: ["search", "tvsearch", "movie", "music", "book"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            item_element: "item".to_string(),
            title_element: "title".to_string(),
            include_query_metadata: true,
        }
    }
}

/// Which fields of a normalization request form its cache key.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheKeyMode {
    /// Key on the raw title alone.
    #[default]
    Title,
    /// Key on the raw title plus every metadata entry.
    TitleAndMetadata,
}

/// Normalization oracle (OpenAI-compatible chat completions) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Enable title rewriting. When disabled every response passes through.
    pub enabled: bool,

    /// API base URL, without the `/chat/completions` suffix.
    pub base_url: String,

    /// Bearer token.
    pub api_key: String,

    /// Model identifier.
    pub model: String,

    pub max_tokens: u32,

    pub temperature: f32,

    /// Per-call timeout in seconds.
    pub timeout_secs: u64,

    /// Inline system prompt.
    pub system_prompt: String,

    /// Path to a system prompt file; takes precedence over `system_prompt`.
    pub system_prompt_file: Option<String>,

    pub cache_key: CacheKeyMode,

    /// Tokens carried over as `[TOKEN]` when a raw title ends with them.
    pub carry_suffixes: Vec<String>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 150,
            temperature: 0.1,
            timeout_secs: 30,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            system_prompt_file: None,
            cache_key: CacheKeyMode::Title,
            carry_suffixes: Vec::new(),
        }
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = "Normalize the release title for a media manager. \
Output ONLY the normalized title in the form \
{Title} - S{season}E{episode} - [Quality][Language].";

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [[routes]]
            port = 9696
            upstream = "http://prowlarr:9696"
            "#,
        )
        .unwrap();

        assert_eq!(config.routes.len(), 1);
        assert_eq!(config.timeouts.upstream_secs, 60.0);
        assert_eq!(config.rewrite.search_types.len(), 5);
        assert_eq!(config.normalizer.cache_key, CacheKeyMode::Title);
        assert!(!config.normalizer.enabled);
    }

    #[test]
    fn test_cache_key_mode_parses_snake_case() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [normalizer]
            cache_key = "title_and_metadata"
            "#,
        )
        .unwrap();
        assert_eq!(config.normalizer.cache_key, CacheKeyMode::TitleAndMetadata);
    }

    #[test]
    fn test_listen_ports_merge_and_default() {
        let mut config = ProxyConfig::default();
        assert_eq!(config.listen_ports(), vec![8080]);

        config.routes.push(RouteConfig { port: 9697, upstream: "http://b".into() });
        config.routes.push(RouteConfig { port: 9696, upstream: "http://a".into() });
        config.listener.extra_ports = vec![9696, 7000];
        assert_eq!(config.listen_ports(), vec![7000, 9696, 9697]);
    }
}
