use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("configuration mismatch: {0}")]
    ConfigMismatch(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("not initialized: {0}")]
    NotInitialized(String),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("embedding failure: {0}")]
    EmbeddingFailure(String),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        operation: &'static str,
        elapsed: Duration,
    },
}

impl RagError {
    pub fn storage<E: std::fmt::Display>(err: E) -> Self {
        RagError::StorageUnavailable(err.to_string())
    }

    pub fn embedding<E: std::fmt::Display>(err: E) -> Self {
        RagError::EmbeddingFailure(err.to_string())
    }

    pub fn provider<E: std::fmt::Display>(err: E) -> Self {
        RagError::Provider(err.to_string())
    }

    pub fn timeout(operation: &'static str, elapsed: Duration) -> Self {
        RagError::Timeout { operation, elapsed }
    }

    /// Missing credentials and provider/dimension mismatches. Never retried.
    pub fn is_configuration(&self) -> bool {
        matches!(self, RagError::Configuration(_) | RagError::ConfigMismatch(_))
    }

    /// Errors raised by external collaborators; the only class a retry policy may repeat.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RagError::StorageUnavailable(_)
                | RagError::EmbeddingFailure(_)
                | RagError::Provider(_)
                | RagError::Timeout { .. }
        )
    }
}
