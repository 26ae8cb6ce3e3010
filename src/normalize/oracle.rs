//! Normalization oracle: the external "raw title in, normalized title out" call.
//!
//! The shipped implementation talks to an OpenAI-compatible
//! `/chat/completions` endpoint. Anything else (a local model, a rules
//! engine, a test double) plugs in through [`TitleOracle`].

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::NormalizerConfig;
use crate::normalize::types::NormalizationRequest;

/// Errors an oracle call can end in. All of them are recovered per title.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle transport error: {0}")]
    Transport(String),

    #[error("oracle returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("oracle response malformed: {0}")]
    Malformed(String),

    #[error("oracle returned an empty title")]
    Empty,

    #[error("oracle misconfigured: {0}")]
    Config(String),
}

/// Maps a raw title (plus metadata) to a normalized title.
pub trait TitleOracle: Send + Sync {
    fn normalize<'a>(
        &'a self,
        request: &'a NormalizationRequest,
    ) -> BoxFuture<'a, Result<String, OracleError>>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: Option<String>,
}

/// Oracle backed by an OpenAI-compatible chat completions API.
#[derive(Debug, Clone)]
pub struct ChatCompletionsOracle {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    system_prompt: String,
}

impl ChatCompletionsOracle {
    pub fn new(config: &NormalizerConfig) -> Result<Self, OracleError> {
        let system_prompt = match &config.system_prompt_file {
            Some(path) => std::fs::read_to_string(path)
                .map_err(|e| OracleError::Config(format!("system prompt {}: {}", path, e)))?,
            None => config.system_prompt.clone(),
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OracleError::Config(e.to_string()))?;

        tracing::info!(model = %config.model, base_url = %config.base_url, "Normalization oracle initialized");

        Ok(Self {
            client,
            url: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            system_prompt: system_prompt.trim().to_string(),
        })
    }

    async fn complete(&self, request: &NormalizationRequest) -> Result<String, OracleError> {
        let user_prompt = request.to_prompt();
        let body = ChatRequest {
            model: &self.model,
            messages: [
                Message { role: "system", content: &self.system_prompt },
                Message { role: "user", content: &user_prompt },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(OracleError::Status {
                status: status.as_u16(),
                body: text.chars().take(200).collect(),
            });
        }

        parse_completion(&text)
    }
}

impl TitleOracle for ChatCompletionsOracle {
    fn normalize<'a>(
        &'a self,
        request: &'a NormalizationRequest,
    ) -> BoxFuture<'a, Result<String, OracleError>> {
        Box::pin(self.complete(request))
    }
}

/// Pull the first choice's content out of a chat completions payload.
fn parse_completion(text: &str) -> Result<String, OracleError> {
    let parsed: ChatResponse =
        serde_json::from_str(text).map_err(|e| OracleError::Malformed(e.to_string()))?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| OracleError::Malformed("no choices".to_string()))?;

    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(OracleError::Empty);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completion() {
        let ok = r#"{"choices":[{"message":{"role":"assistant","content":"  One Piece - 1123-1155 - [WEBDL-1080p][JA]\n"}}]}"#;
        assert_eq!(
            parse_completion(ok).unwrap(),
            "One Piece - 1123-1155 - [WEBDL-1080p][JA]"
        );

        let empty = r#"{"choices":[{"message":{"content":"   "}}]}"#;
        assert!(matches!(parse_completion(empty), Err(OracleError::Empty)));

        let none = r#"{"choices":[]}"#;
        assert!(matches!(parse_completion(none), Err(OracleError::Malformed(_))));

        assert!(matches!(parse_completion("<html>"), Err(OracleError::Malformed(_))));
    }

    #[test]
    fn test_chat_request_shape() {
        let body = ChatRequest {
            model: "gpt-4o-mini",
            messages: [
                Message { role: "system", content: "sys" },
                Message { role: "user", content: "Title: x" },
            ],
            max_tokens: 150,
            temperature: 0.1,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["model"], "gpt-4o-mini");
        assert_eq!(value["messages"][1]["role"], "user");
        assert_eq!(value["max_tokens"], 150);
    }

    #[test]
    fn test_missing_prompt_file_is_config_error() {
        let config = NormalizerConfig {
            system_prompt_file: Some("/nonexistent/prompt.txt".into()),
            ..NormalizerConfig::default()
        };
        assert!(matches!(
            ChatCompletionsOracle::new(&config),
            Err(OracleError::Config(_))
        ));
    }
}
