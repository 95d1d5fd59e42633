//! In-crate fakes for the provider capabilities.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::core::errors::RagError;
use crate::embedding::{EmbeddingBinding, EmbeddingProvider, HashingEmbedder};
use crate::llm::client::{ClientConfig, ProviderConnector};
use crate::llm::provider::{BlockingGenerationProvider, GenerationProvider};
use crate::llm::types::ChatRequest;

/// Keyword embedder with scripted overrides and failures.
///
/// Texts without an override go through a [`HashingEmbedder`], so identical
/// texts embed identically and shared words score higher.
#[derive(Clone)]
pub(crate) struct ScriptedEmbedder {
    hashing: HashingEmbedder,
    model: String,
    vectors: HashMap<String, Vec<f32>>,
    poison: Option<String>,
    transient_failures: Arc<AtomicUsize>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            hashing: HashingEmbedder::new(dimensions).unwrap(),
            model: "scripted".to_string(),
            vectors: HashMap::new(),
            poison: None,
            transient_failures: Arc::new(AtomicUsize::new(0)),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    /// Every call whose batch mentions `needle` fails.
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.poison = Some(needle.to_string());
        self
    }

    /// The next `times` calls fail, later ones succeed.
    /// Makes the next `times` embed calls fail, on every clone.
    pub fn fail_next(&self, times: usize) {
        self.transient_failures.store(times, Ordering::SeqCst);
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for ScriptedEmbedder {
    fn binding(&self) -> EmbeddingBinding {
        EmbeddingBinding::new("test", self.model.clone())
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let pending = self.transient_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.transient_failures.store(pending - 1, Ordering::SeqCst);
            return Err(RagError::EmbeddingFailure("embedding service unavailable".to_string()));
        }
        if let Some(needle) = &self.poison {
            if texts.iter().any(|text| text.contains(needle.as_str())) {
                return Err(RagError::EmbeddingFailure(format!("cannot embed '{}'", needle)));
            }
        }

        Ok(texts
            .iter()
            .map(|text| {
                self.vectors
                    .get(text)
                    .cloned()
                    .unwrap_or_else(|| self.hashing.embed_one(text))
            })
            .collect())
    }
}

enum Reply {
    Text(String),
    Failure(String),
}

/// Generation provider that records each request and answers from a script.
#[derive(Clone)]
pub(crate) struct RecordingGenerator {
    reply: Arc<Reply>,
    transient_failures: Arc<AtomicUsize>,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl RecordingGenerator {
    fn with_reply(reply: Reply) -> Self {
        Self {
            reply: Arc::new(reply),
            transient_failures: Arc::new(AtomicUsize::new(0)),
            delay: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::with_reply(Reply::Text(text.to_string()))
    }

    pub fn failing(message: &str) -> Self {
        Self::with_reply(Reply::Failure(message.to_string()))
    }

    /// The next `times` calls fail with a provider error before the script applies.
    pub fn failing_times(self, times: usize) -> Self {
        self.transient_failures.store(times, Ordering::SeqCst);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn respond(&self, request: &ChatRequest) -> Result<String, RagError> {
        self.requests.lock().unwrap().push(request.clone());

        let pending = self.transient_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.transient_failures.store(pending - 1, Ordering::SeqCst);
            return Err(RagError::provider("503 service unavailable"));
        }
        match self.reply.as_ref() {
            Reply::Text(text) => Ok(text.clone()),
            Reply::Failure(message) => Err(RagError::provider(message)),
        }
    }
}

#[async_trait]
impl GenerationProvider for RecordingGenerator {
    fn name(&self) -> &str {
        "recording"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, RagError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.respond(request)
    }
}

impl BlockingGenerationProvider for RecordingGenerator {
    fn name(&self) -> &str {
        "recording"
    }

    fn complete_blocking(&self, request: &ChatRequest, timeout: Duration) -> Result<String, RagError> {
        if let Some(delay) = self.delay {
            if delay > timeout {
                std::thread::sleep(timeout);
                return Err(RagError::timeout("recording completion", timeout));
            }
            std::thread::sleep(delay);
        }
        self.respond(request)
    }
}

/// Connector handing out one shared [`RecordingGenerator`], counting connects.
pub(crate) struct CountingConnector {
    generator: RecordingGenerator,
    pub async_connects: AtomicUsize,
    pub blocking_connects: AtomicUsize,
}

impl CountingConnector {
    pub fn new(generator: RecordingGenerator) -> Self {
        Self {
            generator,
            async_connects: AtomicUsize::new(0),
            blocking_connects: AtomicUsize::new(0),
        }
    }
}

impl ProviderConnector for CountingConnector {
    fn connect(&self, _config: &ClientConfig) -> Result<Arc<dyn GenerationProvider>, RagError> {
        self.async_connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(self.generator.clone()))
    }

    fn connect_blocking(
        &self,
        _config: &ClientConfig,
    ) -> Result<Arc<dyn BlockingGenerationProvider>, RagError> {
        self.blocking_connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(self.generator.clone()))
    }
}
