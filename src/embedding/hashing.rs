use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::provider::{EmbeddingBinding, EmbeddingProvider};
use crate::core::errors::RagError;
use crate::vector_math::l2_normalize;

const PROVIDER_NAME: &str = "local";
const MODEL_NAME: &str = "hashing-bow-v1";

/// Feature-hashing bag-of-words embedder.
///
/// Each lowercase alphanumeric token is hashed with SHA-256 into one of
/// `dimensions` buckets with a hash-derived sign, then the vector is
/// L2-normalised. Identical texts always map to identical vectors and texts
/// sharing words score a positive cosine similarity, which is all the store
/// needs to work without network access.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Result<Self, RagError> {
        if dimensions == 0 {
            return Err(RagError::Configuration(
                "Hashing embedder needs at least one dimension".to_string(),
            ));
        }
        Ok(Self { dimensions })
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimensions as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        l2_normalize(&mut vector);
        vector
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn binding(&self) -> EmbeddingBinding {
        EmbeddingBinding::new(PROVIDER_NAME, MODEL_NAME).with_dimensions(self.dimensions)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}
