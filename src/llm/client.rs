//! Process-wide generation client.
//!
//! Holds one validated [`ClientConfig`] and lazily builds two independent
//! handles from it: a blocking one and an async one. Each handle is built at
//! most once, even when several callers race for it, and the same handle is
//! returned on every later request.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::OnceCell;

use super::openai::OpenAiConnector;
use super::provider::{BlockingGenerationProvider, GenerationProvider};
use super::types::{ChatMessage, ChatRequest, GenerationParams};
use crate::core::config::defaults::DEFAULT_OPENAI_BASE_URL;
use crate::core::config::RagConfig;
use crate::core::errors::RagError;

/// Recognised client options. Applied when a handle is built; nothing is set
/// on a handle afterwards.
#[derive(Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub organization: Option<String>,
    pub request_timeout: Duration,
    pub user_agent: Option<String>,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            organization: None,
            request_timeout: Duration::from_secs(60),
            user_agent: None,
        }
    }

    pub fn from_config(config: &RagConfig) -> Self {
        Self {
            api_key: config.credentials.api_key.clone().unwrap_or_default(),
            base_url: config.generation.base_url.clone(),
            organization: config.generation.organization.clone(),
            request_timeout: config.generation.timeout(),
            user_agent: None,
        }
    }

    pub fn validate(&self) -> Result<(), RagError> {
        if self.api_key.trim().is_empty() {
            return Err(RagError::Configuration(
                "An API key must be provided".to_string(),
            ));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(RagError::Configuration(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(RagError::Configuration(
                "request_timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"****")
            .field("base_url", &self.base_url)
            .field("organization", &self.organization.as_ref().map(|_| "****"))
            .field("request_timeout", &self.request_timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// Builds provider handles from a validated config.
pub trait ProviderConnector: Send + Sync {
    fn connect(&self, config: &ClientConfig) -> Result<Arc<dyn GenerationProvider>, RagError>;

    fn connect_blocking(
        &self,
        config: &ClientConfig,
    ) -> Result<Arc<dyn BlockingGenerationProvider>, RagError>;
}

#[derive(Clone)]
pub struct SyncHandle {
    provider: Arc<dyn BlockingGenerationProvider>,
}

impl SyncHandle {
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn ptr_eq(&self, other: &SyncHandle) -> bool {
        Arc::ptr_eq(&self.provider, &other.provider)
    }
}

#[derive(Clone)]
pub struct AsyncHandle {
    provider: Arc<dyn GenerationProvider>,
}

impl AsyncHandle {
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn ptr_eq(&self, other: &AsyncHandle) -> bool {
        Arc::ptr_eq(&self.provider, &other.provider)
    }
}

pub struct GenerationClient {
    config: ClientConfig,
    connector: Arc<dyn ProviderConnector>,
    sync_handle: Mutex<Option<SyncHandle>>,
    async_handle: OnceCell<AsyncHandle>,
}

impl GenerationClient {
    /// OpenAI-backed client. Fails immediately when the credential is missing.
    pub fn new(config: ClientConfig) -> Result<Self, RagError> {
        Self::with_connector(config, Arc::new(OpenAiConnector))
    }

    pub fn with_connector(
        config: ClientConfig,
        connector: Arc<dyn ProviderConnector>,
    ) -> Result<Self, RagError> {
        config.validate()?;
        Ok(Self {
            config,
            connector,
            sync_handle: Mutex::new(None),
            async_handle: OnceCell::new(),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn get_or_create_client(&self) -> Result<SyncHandle, RagError> {
        let mut slot = self
            .sync_handle
            .lock()
            .map_err(|_| RagError::provider("generation client lock poisoned"))?;

        if let Some(handle) = slot.as_ref() {
            return Ok(handle.clone());
        }

        let handle = SyncHandle {
            provider: self.connector.connect_blocking(&self.config)?,
        };
        tracing::info!("Created blocking {} client", handle.provider_name());
        *slot = Some(handle.clone());
        Ok(handle)
    }

    pub async fn get_or_create_async_client(&self) -> Result<AsyncHandle, RagError> {
        let handle = self
            .async_handle
            .get_or_try_init(|| async {
                let handle = AsyncHandle {
                    provider: self.connector.connect(&self.config)?,
                };
                tracing::info!("Created async {} client", handle.provider_name());
                Ok::<_, RagError>(handle)
            })
            .await?;
        Ok(handle.clone())
    }

    /// Sends the conversation through the async handle, bounded by the
    /// configured request timeout.
    pub async fn generate(
        &self,
        messages: Vec<ChatMessage>,
        params: &GenerationParams,
    ) -> Result<String, RagError> {
        self.generate_with_deadline(messages, params, self.config.request_timeout)
            .await
    }

    pub async fn generate_with_deadline(
        &self,
        messages: Vec<ChatMessage>,
        params: &GenerationParams,
        deadline: Duration,
    ) -> Result<String, RagError> {
        let request = ChatRequest::new(messages, params.clone())?;
        let handle = self.get_or_create_async_client().await?;

        tracing::debug!(
            model = %request.params.model,
            messages = request.messages.len(),
            "Sending chat completion"
        );

        tokio::time::timeout(deadline, handle.provider.complete(&request))
            .await
            .map_err(|_| RagError::timeout("chat completion", deadline))?
    }

    /// Blocking variant. Must not be called from inside an async runtime.
    pub fn generate_blocking(
        &self,
        messages: Vec<ChatMessage>,
        params: &GenerationParams,
    ) -> Result<String, RagError> {
        self.generate_blocking_with_deadline(messages, params, self.config.request_timeout)
    }

    pub fn generate_blocking_with_deadline(
        &self,
        messages: Vec<ChatMessage>,
        params: &GenerationParams,
        deadline: Duration,
    ) -> Result<String, RagError> {
        let request = ChatRequest::new(messages, params.clone())?;
        let handle = self.get_or_create_client()?;

        tracing::debug!(
            model = %request.params.model,
            messages = request.messages.len(),
            "Sending blocking chat completion"
        );
        handle.provider.complete_blocking(&request, deadline)
    }
}
