//! Embedding providers.
//!
//! - `EmbeddingProvider`: capability trait the vector store embeds through
//! - `OpenAiEmbeddingProvider`: OpenAI-compatible `/v1/embeddings` endpoint
//! - `HashingEmbedder`: offline deterministic bag-of-words embedder

mod hashing;
mod openai;
mod provider;

pub use hashing::HashingEmbedder;
pub use openai::OpenAiEmbeddingProvider;
pub use provider::{EmbeddingBinding, EmbeddingProvider};
