//! Error types for persistent state.

use thiserror::Error;

/// Errors raised by the project-local stores under `.nit/`.
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid baseline id: {0}")]
    InvalidBaselineId(String),
}
