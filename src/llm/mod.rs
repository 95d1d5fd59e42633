pub mod client;
pub mod openai;
pub mod provider;
pub mod types;

pub use client::{AsyncHandle, ClientConfig, GenerationClient, ProviderConnector, SyncHandle};
pub use openai::OpenAiConnector;
pub use provider::{BlockingGenerationProvider, GenerationProvider};
pub use types::{ChatMessage, ChatRequest, GenerationParams, Role};
