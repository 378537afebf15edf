//! The builtin HTTP engine.
//!
//! Speaks OpenAI-compatible chat completions (OpenAI, Ollama, and the
//! platform proxy) and the Anthropic messages API, behind the shared
//! token bucket and retry policy.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::engine::{GenerationRequest, LlmEngine, LlmMessage, LlmResponse};
use crate::errors::LlmError;
use crate::ratelimit::TokenBucket;
use crate::usage::{emit_usage, UsageRecord};

const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_COMPLETION_TOKENS: u32 = 4096;

/// Retry policy for transient failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: f64,
    pub max_delay: f64,
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: 1.0,
            max_delay: 60.0,
            backoff_factor: 2.0,
        }
    }
}

/// Rate-limit policy.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
        }
    }
}

/// Configuration for the builtin engine.
#[derive(Debug, Clone)]
pub struct BuiltinEngineConfig {
    /// openai | anthropic | ollama
    pub provider: String,
    pub model: String,
    pub api_key: String,
    /// Overrides the provider default endpoint (Ollama, platform proxy).
    pub base_url: Option<String>,
    /// Whether `base_url` points at the platform LLM proxy.
    pub proxied: bool,
    /// Usage metadata attached to proxied requests.
    pub platform_metadata: HashMap<String, String>,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
    pub retry: RetryConfig,
    pub rate_limit: RateLimitConfig,
}

impl BuiltinEngineConfig {
    pub fn new(provider: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            api_key: api_key.into(),
            base_url: None,
            proxied: false,
            platform_metadata: HashMap::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            temperature: 0.2,
            max_tokens: DEFAULT_MAX_COMPLETION_TOKENS,
            retry: RetryConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Compute the backoff delay (seconds) for a retry attempt.
pub(crate) fn backoff_delay(retry: &RetryConfig, attempt: u32) -> f64 {
    let delay = retry.base_delay * retry.backoff_factor.powi(attempt as i32);
    delay.min(retry.max_delay)
}

/// Run `call` with the retry policy: transient errors are retried with
/// exponential backoff, everything else (and exhaustion) surfaces the
/// last error.
pub(crate) async fn with_retry<F, Fut>(retry: &RetryConfig, mut call: F) -> Result<LlmResponse, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<LlmResponse, LlmError>>,
{
    let mut attempt = 0u32;
    loop {
        match call().await {
            Ok(response) => return Ok(response),
            Err(err) if err.is_transient() && attempt < retry.max_retries => {
                let delay = backoff_delay(retry, attempt);
                warn!(model = err.model(), attempt, delay, "transient LLM error, retrying: {err}");
                tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

pub struct BuiltinEngine {
    config: BuiltinEngineConfig,
    client: reqwest::Client,
    bucket: TokenBucket,
}

impl BuiltinEngine {
    pub fn new(config: BuiltinEngineConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Other {
                model: config.model.clone(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        let bucket = TokenBucket::new(config.rate_limit.requests_per_minute);
        Ok(Self {
            config,
            client,
            bucket,
        })
    }

    pub fn base_url(&self) -> Option<&str> {
        self.config.base_url.as_deref()
    }

    fn chat_endpoint(&self) -> String {
        match (self.config.base_url.as_deref(), self.config.provider.as_str()) {
            (Some(base), _) => format!("{}/chat/completions", base.trim_end_matches('/')),
            (None, "anthropic") => "https://api.anthropic.com/v1/messages".to_string(),
            (None, "ollama") => "http://localhost:11434/v1/chat/completions".to_string(),
            (None, _) => "https://api.openai.com/v1/chat/completions".to_string(),
        }
    }

    fn request_model(&self, request: &GenerationRequest) -> String {
        request.model.clone().unwrap_or_else(|| self.config.model.clone())
    }

    fn estimated_headers(&self, request: &GenerationRequest) -> Vec<(String, String)> {
        let prompt_estimate: usize = request
            .messages
            .iter()
            .map(|m| self.count_tokens(&m.content))
            .sum::<usize>()
            .max(1);
        let completion_estimate = request.max_tokens.unwrap_or(self.config.max_tokens);
        vec![
            ("x-nit-estimated-prompt-tokens".into(), prompt_estimate.to_string()),
            ("x-nit-estimated-completion-tokens".into(), completion_estimate.to_string()),
        ]
    }

    async fn dispatch(&self, request: &GenerationRequest) -> Result<LlmResponse, LlmError> {
        let model = self.request_model(request);
        if self.config.provider == "anthropic" && !self.config.proxied {
            self.dispatch_anthropic(request, &model).await
        } else {
            self.dispatch_openai_compatible(request, &model).await
        }
    }

    async fn dispatch_openai_compatible(
        &self,
        request: &GenerationRequest,
        model: &str,
    ) -> Result<LlmResponse, LlmError> {
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMessage,
        }
        #[derive(Deserialize)]
        struct ChoiceMessage {
            content: Option<String>,
        }
        #[derive(Deserialize, Default)]
        struct Usage {
            #[serde(default)]
            prompt_tokens: u32,
            #[serde(default)]
            completion_tokens: u32,
        }
        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
            #[serde(default)]
            usage: Option<Usage>,
            #[serde(default)]
            model: Option<String>,
        }

        let body = json!({
            "model": model,
            "messages": &request.messages,
            "temperature": request.temperature.unwrap_or(self.config.temperature),
            "max_tokens": request.max_tokens.unwrap_or(self.config.max_tokens),
        });

        let mut builder = self
            .client
            .post(self.chat_endpoint())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json");

        if self.config.proxied {
            for (name, value) in self.estimated_headers(request) {
                builder = builder.header(name, value);
            }
            for (name, value) in &self.config.platform_metadata {
                builder = builder.header(format!("x-nit-{name}"), value);
            }
        }

        let response = builder
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(model, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(self.map_status_error(model, status.as_u16(), text));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| LlmError::Other {
            model: model.to_string(),
            message: format!("failed to parse provider response: {e}"),
        })?;

        let text = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| LlmError::Other {
                model: model.to_string(),
                message: "no choices in provider response".to_string(),
            })?;
        let usage = parsed.usage.unwrap_or_default();

        Ok(LlmResponse {
            text,
            model: parsed.model.unwrap_or_else(|| model.to_string()),
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        })
    }

    async fn dispatch_anthropic(
        &self,
        request: &GenerationRequest,
        model: &str,
    ) -> Result<LlmResponse, LlmError> {
        #[derive(Deserialize)]
        struct ContentBlock {
            #[serde(default)]
            text: String,
        }
        #[derive(Deserialize, Default)]
        struct Usage {
            #[serde(default)]
            input_tokens: u32,
            #[serde(default)]
            output_tokens: u32,
        }
        #[derive(Deserialize)]
        struct MessagesResponse {
            content: Vec<ContentBlock>,
            #[serde(default)]
            usage: Usage,
            #[serde(default)]
            model: Option<String>,
        }

        // Anthropic takes the system prompt as a top-level field.
        let system: String = request
            .messages
            .iter()
            .filter(|m| m.role == "system")
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let messages: Vec<&LlmMessage> =
            request.messages.iter().filter(|m| m.role != "system").collect();

        let mut body = json!({
            "model": model,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(self.config.max_tokens),
            "temperature": request.temperature.unwrap_or(self.config.temperature),
        });
        if !system.is_empty() {
            body["system"] = json!(system);
        }

        let response = self
            .client
            .post(self.chat_endpoint())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(model, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(self.map_status_error(model, status.as_u16(), text));
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| LlmError::Other {
            model: model.to_string(),
            message: format!("failed to parse provider response: {e}"),
        })?;

        let text = parsed
            .content
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        Ok(LlmResponse {
            text,
            model: parsed.model.unwrap_or_else(|| model.to_string()),
            prompt_tokens: parsed.usage.input_tokens,
            completion_tokens: parsed.usage.output_tokens,
        })
    }

    fn map_transport_error(&self, model: &str, err: reqwest::Error) -> LlmError {
        if err.is_timeout() {
            LlmError::Timeout {
                model: model.to_string(),
                timeout_secs: self.config.timeout_secs,
            }
        } else {
            LlmError::Connection {
                model: model.to_string(),
                message: err.to_string(),
            }
        }
    }

    fn map_status_error(&self, model: &str, status: u16, body: String) -> LlmError {
        let model = model.to_string();
        match status {
            401 | 403 => LlmError::Auth { model, message: body },
            429 => LlmError::RateLimit { model, message: body },
            400 | 404 | 422 => LlmError::InvalidRequest { model, message: body },
            _ => LlmError::Connection {
                model,
                message: format!("HTTP {status}: {body}"),
            },
        }
    }
}

#[async_trait]
impl LlmEngine for BuiltinEngine {
    async fn generate(&self, request: GenerationRequest) -> Result<LlmResponse, LlmError> {
        if request.messages.is_empty() {
            return Err(LlmError::InvalidRequest {
                model: self.config.model.clone(),
                message: "generation request has no messages".into(),
            });
        }

        self.bucket.acquire().await;
        debug!(model = %self.request_model(&request), "dispatching LLM request");

        let response = with_retry(&self.config.retry, || self.dispatch(&request)).await?;

        emit_usage(&UsageRecord {
            model: response.model.clone(),
            prompt_tokens: response.prompt_tokens,
            completion_tokens: response.completion_tokens,
            template_name: request.metadata.get("nit_template_name").cloned(),
            builder_name: request.metadata.get("nit_builder_name").cloned(),
            source_file: request.metadata.get("nit_source_file").cloned(),
        });

        Ok(response)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// ── CLI-mode engine ─────────────────────────────────────────────────

/// Engine that pipes the rendered prompt through an external command
/// (`llm.mode = cli | custom`).
pub struct CliEngine {
    pub command: String,
    pub model: String,
    pub timeout_secs: u64,
    pub extra_args: Vec<String>,
}

#[async_trait]
impl LlmEngine for CliEngine {
    async fn generate(&self, request: GenerationRequest) -> Result<LlmResponse, LlmError> {
        use tokio::io::AsyncWriteExt;

        let prompt: String = request
            .messages
            .iter()
            .map(|m| format!("[{}]\n{}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c")
            .arg(format!("{} {}", self.command, self.extra_args.join(" ")))
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| LlmError::Connection {
            model: self.model.clone(),
            message: format!("failed to spawn CLI command: {e}"),
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| LlmError::Connection {
                    model: self.model.clone(),
                    message: format!("failed to write prompt: {e}"),
                })?;
        }

        let output = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| LlmError::Timeout {
            model: self.model.clone(),
            timeout_secs: self.timeout_secs,
        })?
        .map_err(|e| LlmError::Connection {
            model: self.model.clone(),
            message: e.to_string(),
        })?;

        if !output.status.success() {
            return Err(LlmError::Other {
                model: self.model.clone(),
                message: format!(
                    "CLI command exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr)
                ),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let prompt_tokens = (prompt.len() / 4) as u32;
        let completion_tokens = (text.len() / 4) as u32;
        Ok(LlmResponse {
            text,
            model: self.model.clone(),
            prompt_tokens,
            completion_tokens,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn backoff_delay_is_exponential() {
        let retry = RetryConfig::default();
        assert_eq!(backoff_delay(&retry, 0), 1.0);
        assert_eq!(backoff_delay(&retry, 1), 2.0);
        assert_eq!(backoff_delay(&retry, 2), 4.0);
        assert_eq!(backoff_delay(&retry, 3), 8.0);
    }

    #[test]
    fn backoff_delay_is_capped() {
        let retry = RetryConfig {
            max_delay: 5.0,
            ..Default::default()
        };
        assert_eq!(backoff_delay(&retry, 10), 5.0);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_errors_until_success() {
        let retry = RetryConfig {
            max_retries: 3,
            base_delay: 0.01,
            ..Default::default()
        };
        let calls = Cell::new(0u32);
        let result = with_retry(&retry, || {
            let n = calls.get() + 1;
            calls.set(n);
            async move {
                if n < 3 {
                    Err(LlmError::RateLimit {
                        model: "m".into(),
                        message: "rate limited".into(),
                    })
                } else {
                    Ok(LlmResponse {
                        text: "Hello!".into(),
                        model: "m".into(),
                        ..Default::default()
                    })
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result.text, "Hello!");
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn auth_errors_are_not_retried() {
        let retry = RetryConfig::default();
        let calls = Cell::new(0u32);
        let result = with_retry(&retry, || {
            calls.set(calls.get() + 1);
            async {
                Err(LlmError::Auth {
                    model: "m".into(),
                    message: "invalid key".into(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(LlmError::Auth { .. })));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_surface_last_error() {
        let retry = RetryConfig {
            max_retries: 1,
            base_delay: 0.01,
            ..Default::default()
        };
        let calls = Cell::new(0u32);
        let result = with_retry(&retry, || {
            calls.set(calls.get() + 1);
            async {
                Err(LlmError::Connection {
                    model: "m".into(),
                    message: "connection refused".into(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(LlmError::Connection { .. })));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn token_count_fallback_is_four_chars_per_token() {
        let engine =
            BuiltinEngine::new(BuiltinEngineConfig::new("openai", "gpt-4o", "sk-test")).unwrap();
        assert_eq!(engine.count_tokens("hello world"), 2);
    }

    #[test]
    fn chat_endpoint_respects_base_url() {
        let mut config = BuiltinEngineConfig::new("openai", "gpt-4o", "key");
        config.base_url = Some("https://platform.example/api/v1/llm-proxy".into());
        let engine = BuiltinEngine::new(config).unwrap();
        assert_eq!(
            engine.chat_endpoint(),
            "https://platform.example/api/v1/llm-proxy/chat/completions"
        );
    }

    #[test]
    fn status_mapping_matches_taxonomy() {
        let engine =
            BuiltinEngine::new(BuiltinEngineConfig::new("openai", "gpt-4o", "sk-test")).unwrap();
        assert!(matches!(
            engine.map_status_error("m", 401, String::new()),
            LlmError::Auth { .. }
        ));
        assert!(matches!(
            engine.map_status_error("m", 429, String::new()),
            LlmError::RateLimit { .. }
        ));
        assert!(matches!(
            engine.map_status_error("m", 400, String::new()),
            LlmError::InvalidRequest { .. }
        ));
        assert!(matches!(
            engine.map_status_error("m", 503, String::new()),
            LlmError::Connection { .. }
        ));
    }
}
