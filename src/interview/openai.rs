//! OpenAI-compatible chat completion backend for the judge.
//!
//! Works against any server that speaks the `/chat/completions` API. Rate
//! limits and server-side failures (408, 429, most 5xx) are retried with
//! exponential backoff; other failures are returned at once.

use crate::interview::judge::{ChatMessage, ChatModel};
use crate::mcp::retry::{retry_with_backoff, should_retry_status, RetryConfig};
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Connection settings for an OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub request_timeout: Duration,
    pub retry: RetryConfig,
}

impl OpenAiConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            temperature: 0.0,
            request_timeout: Duration::from_secs(120),
            retry: RetryConfig::default(),
        }
    }

    /// Read the API key from the environment variable `var`
    pub fn with_api_key_from_env(mut self, var: &str) -> Self {
        self.api_key = std::env::var(var).ok().filter(|key| !key.is_empty());
        if self.api_key.is_none() {
            tracing::warn!("{} is not set; judge requests will be unauthenticated", var);
        }
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug)]
enum RequestError {
    Status { status: u16, body: String },
    Http(reqwest::Error),
}

impl RequestError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => should_retry_status(*status),
            Self::Http(e) => e.is_timeout() || e.is_connect(),
        }
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status { status, body } => write!(f, "HTTP {}: {}", status, body),
            Self::Http(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for RequestError {}

/// Chat model served over HTTP
pub struct OpenAiChatModel {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiChatModel {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build judge HTTP client")?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    async fn send(&self, body: &CompletionRequest<'_>) -> Result<Value, RequestError> {
        let mut request = self.client.post(self.config.endpoint()).json(body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(RequestError::Http)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RequestError::Status {
                status: status.as_u16(),
                body,
            });
        }
        response.json().await.map_err(RequestError::Http)
    }
}

impl ChatModel for OpenAiChatModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = CompletionRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
        };
        tracing::debug!(
            "Requesting completion from {} ({} messages)",
            self.config.model,
            messages.len()
        );

        let response = retry_with_backoff(&self.config.retry, RequestError::is_retryable, || {
            self.send(&body)
        })
        .await
        .with_context(|| format!("Chat completion request to {} failed", self.config.endpoint()))?;

        completion_text(&response)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Pull the first choice's message text out of a completion response
pub fn completion_text(response: &Value) -> Result<String> {
    if let Some(error) = response.get("error") {
        anyhow::bail!("Completion API returned an error: {}", error);
    }
    let content = response
        .pointer("/choices/0/message/content")
        .context("Completion response has no choices[0].message")?;
    match content {
        Value::String(text) => Ok(text.clone()),
        Value::Null => Ok(String::new()),
        other => anyhow::bail!("Unexpected completion content: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_joins_cleanly() {
        let mut config = OpenAiConfig::new("gpt-4o");
        assert_eq!(config.endpoint(), "https://api.openai.com/v1/chat/completions");

        config.base_url = "http://localhost:11434/v1/".to_string();
        assert_eq!(config.endpoint(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn test_request_body_shape() {
        let messages = vec![ChatMessage::system("be strict"), ChatMessage::user("score")];
        let body = CompletionRequest {
            model: "gpt-4o",
            messages: &messages,
            temperature: 0.0,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["model"], "gpt-4o");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "score");
    }

    #[test]
    fn test_completion_text() {
        let response = json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "{\"ok\": true}"}}]
        });
        assert_eq!(completion_text(&response).unwrap(), "{\"ok\": true}");
    }

    #[test]
    fn test_null_content_is_empty() {
        let response = json!({"choices": [{"message": {"role": "assistant", "content": null}}]});
        assert_eq!(completion_text(&response).unwrap(), "");
    }

    #[test]
    fn test_completion_errors() {
        assert!(completion_text(&json!({"choices": []})).is_err());
        let err = completion_text(&json!({"error": {"message": "invalid key"}})).unwrap_err();
        assert!(err.to_string().contains("invalid key"));
    }

    #[test]
    fn test_retryable_statuses() {
        let status = |code| RequestError::Status {
            status: code,
            body: String::new(),
        };
        assert!(status(429).is_retryable());
        assert!(status(503).is_retryable());
        assert!(!status(401).is_retryable());
        assert!(!status(400).is_retryable());
    }
}
