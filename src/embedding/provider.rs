use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::RagError;

/// Identity of the embedding configuration a collection was built with.
///
/// Persisted alongside the collection and compared on every load: vectors
/// produced by different models are never mixed in one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingBinding {
    pub provider: String,
    pub model: String,
    /// Output dimension when the provider knows it up front.
    pub dimensions: Option<usize>,
}

impl EmbeddingBinding {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            dimensions: None,
        }
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    /// Same provider and model. Declared dimensions are checked separately
    /// against what is actually stored.
    pub fn is_compatible_with(&self, other: &EmbeddingBinding) -> bool {
        self.provider == other.provider && self.model == other.model
    }
}

impl fmt::Display for EmbeddingBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)?;
        if let Some(dimensions) = self.dimensions {
            write!(f, " ({}d)", dimensions)?;
        }
        Ok(())
    }
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn binding(&self) -> EmbeddingBinding;

    /// Embed `texts`, returning one vector per input in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError>;
}
