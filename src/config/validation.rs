//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate upstream URLs and route ports
//! - Validate value ranges (timeouts > 0)
//! - Check the normalizer has what it needs when enabled
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// Upper bound for `timeouts.upstream_secs` (one day).
pub const MAX_UPSTREAM_SECS: f64 = 86_400.0;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("route port {0} is configured more than once")]
    DuplicatePort(u16),

    #[error("port 0 is not a valid listen port")]
    ZeroPort,

    #[error("upstream for port {port} is not an absolute http:// URL: {upstream}")]
    InvalidUpstream { port: u16, upstream: String },

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("timeouts.{0} must be a finite number of seconds no larger than {max}", max = MAX_UPSTREAM_SECS)]
    TimeoutOutOfRange(&'static str),

    #[error("rewrite.search_types must not be empty")]
    NoSearchTypes,

    #[error("rewrite.{0} must not be empty")]
    EmptyElementName(&'static str),

    #[error("normalizer is enabled but normalizer.{0} is empty")]
    NormalizerIncomplete(&'static str),

    #[error("normalizer.base_url is not a valid URL: {0}")]
    InvalidNormalizerUrl(String),

    #[error("observability.metrics_address is not a socket address: {0}")]
    InvalidMetricsAddress(String),
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    for route in &config.routes {
        if route.port == 0 {
            errors.push(ValidationError::ZeroPort);
        }
        if !seen.insert(route.port) {
            errors.push(ValidationError::DuplicatePort(route.port));
        }
        if !is_http_url(&route.upstream) {
            errors.push(ValidationError::InvalidUpstream {
                port: route.port,
                upstream: route.upstream.clone(),
            });
        }
    }
    if config.listener.extra_ports.contains(&0) {
        errors.push(ValidationError::ZeroPort);
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_secs"));
    }
    let upstream_secs = config.timeouts.upstream_secs;
    if !(upstream_secs > 0.0) {
        errors.push(ValidationError::ZeroTimeout("upstream_secs"));
    } else if !upstream_secs.is_finite() || upstream_secs > MAX_UPSTREAM_SECS {
        errors.push(ValidationError::TimeoutOutOfRange("upstream_secs"));
    }

    let rewrite = &config.rewrite;
    if rewrite.search_types.is_empty() {
        errors.push(ValidationError::NoSearchTypes);
    }
    if rewrite.item_element.trim().is_empty() {
        errors.push(ValidationError::EmptyElementName("item_element"));
    }
    if rewrite.title_element.trim().is_empty() {
        errors.push(ValidationError::EmptyElementName("title_element"));
    }

    let normalizer = &config.normalizer;
    if normalizer.enabled {
        if normalizer.api_key.trim().is_empty() {
            errors.push(ValidationError::NormalizerIncomplete("api_key"));
        }
        if normalizer.model.trim().is_empty() {
            errors.push(ValidationError::NormalizerIncomplete("model"));
        }
        if Url::parse(&normalizer.base_url).is_err() {
            errors.push(ValidationError::InvalidNormalizerUrl(normalizer.base_url.clone()));
        }
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_http_url(raw: &str) -> bool {
    match Url::parse(raw) {
        Ok(url) => url.scheme() == "http" && url.host_str().is_some(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RouteConfig;

    fn route(port: u16, upstream: &str) -> RouteConfig {
        RouteConfig { port, upstream: upstream.to_string() }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ProxyConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ProxyConfig::default();
        config.routes = vec![
            route(9696, "http://a:9696"),
            route(9696, "ftp://b"),
            route(0, "not a url"),
        ];
        config.timeouts.connect_secs = 0;
        config.rewrite.search_types.clear();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::DuplicatePort(9696)));
        assert!(errors.contains(&ValidationError::ZeroPort));
        assert!(errors.contains(&ValidationError::ZeroTimeout("connect_secs")));
        assert!(errors.contains(&ValidationError::NoSearchTypes));
        let invalid = errors
            .iter()
            .filter(|e| matches!(e, ValidationError::InvalidUpstream { .. }))
            .count();
        assert_eq!(invalid, 2);
    }

    #[test]
    fn test_upstream_timeout_must_be_finite_and_bounded() {
        for secs in [f64::INFINITY, 1e30, MAX_UPSTREAM_SECS + 1.0] {
            let mut config = ProxyConfig::default();
            config.timeouts.upstream_secs = secs;
            let errors = validate_config(&config).unwrap_err();
            assert_eq!(errors, vec![ValidationError::TimeoutOutOfRange("upstream_secs")]);
        }

        let mut config = ProxyConfig::default();
        config.timeouts.upstream_secs = f64::NAN;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::ZeroTimeout("upstream_secs")]);

        config.timeouts.upstream_secs = MAX_UPSTREAM_SECS;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_enabled_normalizer_needs_api_key() {
        let mut config = ProxyConfig::default();
        config.normalizer.enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::NormalizerIncomplete("api_key")]);

        config.normalizer.api_key = "sk-test".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = ProxyConfig::default();
        config.observability.metrics_address = "nope".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
