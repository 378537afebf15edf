//! LLM error taxonomy.
//!
//! Auth and invalid-request errors are terminal for the affected call;
//! rate-limit and connection errors are retried by the engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Authentication failed for model {model}: {message}")]
    Auth { model: String, message: String },

    #[error("Rate limited on model {model}: {message}")]
    RateLimit { model: String, message: String },

    #[error("Connection error for model {model}: {message}")]
    Connection { model: String, message: String },

    #[error("Invalid request for model {model}: {message}")]
    InvalidRequest { model: String, message: String },

    #[error("LLM call timed out after {timeout_secs}s (model {model})")]
    Timeout { model: String, timeout_secs: u64 },

    #[error("LLM error for model {model}: {message}")]
    Other { model: String, message: String },
}

impl LlmError {
    /// Whether the engine should retry after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, LlmError::RateLimit { .. } | LlmError::Connection { .. })
    }

    pub fn model(&self) -> &str {
        match self {
            LlmError::Auth { model, .. }
            | LlmError::RateLimit { model, .. }
            | LlmError::Connection { model, .. }
            | LlmError::InvalidRequest { model, .. }
            | LlmError::Timeout { model, .. }
            | LlmError::Other { model, .. } => model,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        let rate = LlmError::RateLimit {
            model: "m".into(),
            message: "slow down".into(),
        };
        let auth = LlmError::Auth {
            model: "m".into(),
            message: "bad key".into(),
        };
        assert!(rate.is_transient());
        assert!(!auth.is_transient());
    }
}
