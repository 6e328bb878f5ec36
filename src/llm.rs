//! Completion client.
//!
//! [`CompletionClient`] is the seam between the dialogue logic and the
//! hosted language model. [`ChatCompletionsClient`] speaks the
//! OpenAI-compatible `POST {base_url}/chat/completions` protocol, which
//! Groq, OpenAI and most local servers implement.
//!
//! # Retry Strategy
//!
//! - HTTP 5xx and network errors → retry with backoff (1s, 2s, 4s, ...)
//! - Rate limits (HTTP 429/413, or a body naming `rate_limit_exceeded` or
//!   `Request too large`) → [`CompletionError::RateLimited`] immediately,
//!   so the caller can degrade the answer instead of waiting
//! - Other 4xx → [`CompletionError::Transport`] without retry

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::CompletionError;
use crate::models::ChatMessage;

/// Provider error substrings that mean "too much, too fast".
pub const RATE_LIMIT_MARKERS: [&str; 2] = ["rate_limit_exceeded", "Request too large"];

/// Sends a role-tagged conversation to a model and returns the reply text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, CompletionError>;
}

/// True if a provider message indicates a rate or size limit.
pub fn is_rate_limit_message(text: &str) -> bool {
    RATE_LIMIT_MARKERS.iter().any(|m| text.contains(m))
}

/// Client for OpenAI-compatible chat completion endpoints.
pub struct ChatCompletionsClient {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
    max_retries: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl ChatCompletionsClient {
    /// Build a client, reading the API key from `config.api_key_env`.
    pub fn from_config(config: &LlmConfig) -> Result<Self, CompletionError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| CompletionError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(config, api_key)
    }

    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            client,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl CompletionClient for ChatCompletionsClient {
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, CompletionError> {
        let body = serde_json::json!({
            "model": model,
            "messages": messages,
            "temperature": temperature,
            "max_tokens": max_tokens,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let sent = self
                .client
                .post(&self.endpoint)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
                .send()
                .await;

            let response = match sent {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "completion request failed");
                    last_err = Some(CompletionError::from(e));
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                let parsed: CompletionResponse = response.json().await?;
                return parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .ok_or(CompletionError::Empty);
            }

            let body_text = response.text().await.unwrap_or_default();
            let detail = format!("{} {}", status, body_text);

            if status.as_u16() == 429 || status.as_u16() == 413 || is_rate_limit_message(&body_text)
            {
                tracing::warn!(model, %status, "completion rate limited");
                return Err(CompletionError::RateLimited(detail));
            }

            if status.is_server_error() {
                tracing::warn!(attempt, %status, "completion server error, retrying");
                last_err = Some(CompletionError::Transport(detail));
                continue;
            }

            return Err(CompletionError::Transport(detail));
        }

        Err(last_err
            .unwrap_or_else(|| CompletionError::Transport("completion failed after retries".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_markers() {
        assert!(is_rate_limit_message(
            "Error code: 429 - {'error': {'code': 'rate_limit_exceeded'}}"
        ));
        assert!(is_rate_limit_message("Request too large for model"));
        assert!(!is_rate_limit_message("invalid api key"));
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let cfg = LlmConfig {
            base_url: "http://localhost:9999/v1/".into(),
            ..LlmConfig::default()
        };
        let client = ChatCompletionsClient::new(&cfg, "k".into()).unwrap();
        assert_eq!(client.endpoint, "http://localhost:9999/v1/chat/completions");
    }

    #[test]
    fn test_missing_key_env() {
        let cfg = LlmConfig {
            api_key_env: "MTG_JUDGE_TEST_UNSET_KEY_VAR".into(),
            ..LlmConfig::default()
        };
        assert!(matches!(
            ChatCompletionsClient::from_config(&cfg),
            Err(CompletionError::MissingApiKey(_))
        ));
    }
}
