//! Typed judge client.
//!
//! Wraps a chat model so callers get a validated Rust value back instead of
//! raw text. Replies are often wrapped in prose or code fences, so the first
//! balanced-looking JSON value is cut out of the text before validation.
//! When parsing or validation fails, the bad reply and the error are added
//! to the conversation and the model gets another try, within a fixed budget.

use crate::error::JudgeError;
use crate::metrics;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Default number of repair turns after the first attempt
pub const DEFAULT_MAX_RETRIES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A language model that turns a conversation into reply text
#[allow(async_fn_in_trait)]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<String>;

    /// Model identifier recorded in scorecards
    fn model_name(&self) -> &str;
}

/// Cut the JSON value out of a model reply
///
/// Finds the first `{`, `[` or `"` and the last matching closer, and returns
/// the text between them (inclusive). Only the slice is returned; whether it
/// is valid JSON is for the caller's parser to decide.
pub fn extract_json(text: &str) -> Result<&str, String> {
    let (start, opener) = text
        .char_indices()
        .find(|(_, c)| matches!(c, '{' | '[' | '"'))
        .ok_or_else(|| "No JSON start character found".to_string())?;

    let closer = match opener {
        '{' => '}',
        '[' => ']',
        _ => '"',
    };

    match text[start + 1..].rfind(closer) {
        Some(offset) => {
            let end = start + 1 + offset;
            Ok(&text[start..=end])
        }
        None => Err(format!("No matching JSON end character '{}' found", closer)),
    }
}

/// Extract and validate one reply
pub fn parse_reply<T: DeserializeOwned>(reply: &str) -> Result<T, String> {
    let json = extract_json(reply)?;
    serde_json::from_str(json).map_err(|e| e.to_string())
}

/// Structured-output wrapper around a [`ChatModel`]
pub struct JudgeClient<M> {
    model: M,
    max_retries: usize,
}

impl<M: ChatModel> JudgeClient<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Ask for a reply of type `T`
    ///
    /// Makes at most `max_retries + 1` attempts. A failed completion request
    /// or an empty reply ends the call at once; only parse and validation
    /// failures are repaired.
    ///
    /// # Errors
    ///
    /// [`JudgeError::RetriesExhausted`] when every attempt produced an
    /// unusable reply.
    pub async fn complete<T: DeserializeOwned>(
        &self,
        initial_messages: Vec<ChatMessage>,
    ) -> Result<T, JudgeError> {
        let attempts = self.max_retries + 1;
        let mut messages = initial_messages;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let reply = match self.model.complete(&messages).await {
                Ok(reply) => reply,
                Err(e) => {
                    metrics::JUDGE_COMPLETIONS.with_label_values(&["error"]).inc();
                    return Err(JudgeError::Completion(e));
                }
            };
            if reply.trim().is_empty() {
                metrics::JUDGE_COMPLETIONS.with_label_values(&["error"]).inc();
                return Err(JudgeError::EmptyCompletion);
            }

            match parse_reply::<T>(&reply) {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!("Judge reply valid after {} attempts", attempt);
                    }
                    metrics::JUDGE_COMPLETIONS.with_label_values(&["ok"]).inc();
                    return Ok(value);
                }
                Err(error) => {
                    tracing::debug!("Judge reply attempt {} unusable: {}", attempt, error);
                    metrics::JUDGE_COMPLETIONS.with_label_values(&["repair"]).inc();
                    messages.push(ChatMessage::assistant(reply));
                    messages.push(ChatMessage::user(format!(
                        "Error parsing json: {}\nReply again with only the corrected JSON value.",
                        error
                    )));
                    last_error = error;
                }
            }
        }

        metrics::JUDGE_COMPLETIONS.with_label_values(&["exhausted"]).inc();
        Err(JudgeError::RetriesExhausted {
            attempts,
            last_error,
        })
    }
}
