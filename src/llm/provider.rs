use std::time::Duration;

use async_trait::async_trait;

use super::types::ChatRequest;
use crate::core::errors::RagError;

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// return the provider name (e.g. "openai")
    fn name(&self) -> &str;

    /// chat completion, returning the text of the single best choice
    async fn complete(&self, request: &ChatRequest) -> Result<String, RagError>;
}

/// Blocking counterpart of [`GenerationProvider`] for callers outside an async runtime.
pub trait BlockingGenerationProvider: Send + Sync {
    fn name(&self) -> &str;

    /// `timeout` bounds this one call, overriding any client-wide default.
    fn complete_blocking(&self, request: &ChatRequest, timeout: Duration) -> Result<String, RagError>;
}
