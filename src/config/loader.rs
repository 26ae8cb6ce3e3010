//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{LogFormat, ProxyConfig, RouteConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env { var: &'static str, value: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { var, value } => {
                write!(f, "Invalid value for {}: {:?}", var, value)
            }
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration: optional TOML file, then process environment, then validation.
pub fn load_config(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_file(path)?,
        None => ProxyConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn parse_file(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map_err(ConfigError::Parse)
}

/// Apply environment overrides on top of `config`.
///
/// `lookup` abstracts the environment so tests don't touch process state.
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup("PROXY_ROUTES") {
        config.routes = parse_routes(&raw).ok_or(ConfigError::Env {
            var: "PROXY_ROUTES",
            value: raw.clone(),
        })?;
    } else if let Some(upstream) = lookup("UPSTREAM_URL") {
        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Env { var: "PORT", value: raw.clone() })?,
            None => config.listener.default_port,
        };
        config.routes = vec![RouteConfig { port, upstream }];
    }

    if let Some(raw) = lookup("PROXY_TIMEOUT") {
        config.timeouts.upstream_secs = raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Env { var: "PROXY_TIMEOUT", value: raw.clone() })?;
    }

    if let Some(key) = lookup("OPENAI_API_KEY") {
        config.normalizer.api_key = key;
        config.normalizer.enabled = true;
    }
    if let Some(raw) = lookup("LLM_ENABLED") {
        config.normalizer.enabled = parse_bool(&raw)
            .ok_or(ConfigError::Env { var: "LLM_ENABLED", value: raw.clone() })?;
    }
    if let Some(base_url) = lookup("OPENAI_BASE_URL") {
        config.normalizer.base_url = base_url;
    }
    if let Some(model) = lookup("OPENAI_MODEL") {
        config.normalizer.model = model;
    }

    if let Some(level) = lookup("LOG_LEVEL") {
        config.observability.log_level = level;
    }
    if let Some(raw) = lookup("LOG_FORMAT") {
        config.observability.log_format = match raw.trim().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" | "text" => LogFormat::Pretty,
            _ => return Err(ConfigError::Env { var: "LOG_FORMAT", value: raw }),
        };
    }

    Ok(())
}

/// Parse `9696=http://a,9697=http://b`.
fn parse_routes(raw: &str) -> Option<Vec<RouteConfig>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (port, upstream) = entry.split_once('=')?;
            Some(RouteConfig {
                port: port.trim().parse().ok()?,
                upstream: upstream.trim().to_string(),
            })
        })
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
