//! The uniform engine contract.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::LlmError;

/// One chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmMessage {
    /// system | user | assistant
    pub role: String,
    pub content: String,
}

impl LlmMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

/// A generation request: ordered messages plus sampling overrides and
/// free-form metadata used for usage attribution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub messages: Vec<LlmMessage>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl GenerationRequest {
    pub fn from_messages(messages: Vec<LlmMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }
}

/// A generation response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub model: String,
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

impl LlmResponse {
    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Uniform contract over providers. One implementation is enough;
/// provider choice is a configuration concern.
#[async_trait]
pub trait LlmEngine: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<LlmResponse, LlmError>;

    /// Count tokens for pre-flight sizing; implementations may fall back
    /// to a 4-characters-per-token estimate.
    fn count_tokens(&self, text: &str) -> usize {
        text.len() / 4
    }

    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_tokens_is_prompt_plus_completion() {
        let resp = LlmResponse {
            text: "hi".into(),
            model: "m".into(),
            prompt_tokens: 10,
            completion_tokens: 5,
        };
        assert_eq!(resp.total_tokens(), 15);
    }

    #[test]
    fn response_defaults_to_zero_usage() {
        let resp = LlmResponse {
            text: "hi".into(),
            model: "m".into(),
            ..Default::default()
        };
        assert_eq!(resp.total_tokens(), 0);
    }
}
