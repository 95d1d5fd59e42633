//! Retrieve-then-generate orchestration.
//!
//! A run embeds and ranks the query against one collection, labels the hits
//! `Document 1..n` in ranked order, and asks the generation client for a
//! grounded answer. Any stage failure aborts the run with the originating
//! error; no partial answer is produced.

pub mod prompt;
pub mod retry;


use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::core::config::RagConfig;
use crate::core::errors::RagError;
use crate::llm::{GenerationClient, GenerationParams};
use crate::rag::{QueryResult, VectorCollection};

pub use retry::RetryPolicy;

#[derive(Debug, Clone, Default)]
pub struct PipelineSettings {
    pub params: GenerationParams,
    pub retry: RetryPolicy,
}

impl PipelineSettings {
    pub fn from_config(config: &RagConfig) -> Self {
        Self {
            params: GenerationParams::new(
                config.generation.model.clone(),
                config.generation.max_tokens,
                config.generation.temperature,
            ),
            retry: RetryPolicy::from(&config.retry),
        }
    }
}

/// Answer text together with the ranked documents it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<QueryResult>,
}

pub struct QueryPipeline {
    collection: VectorCollection,
    client: Arc<GenerationClient>,
    settings: PipelineSettings,
}

impl QueryPipeline {
    pub fn new(
        collection: VectorCollection,
        client: Arc<GenerationClient>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            collection,
            client,
            settings,
        }
    }

    pub fn collection(&self) -> &VectorCollection {
        &self.collection
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// The generator's completion text, returned unmodified.
    pub async fn answer(&self, query: &str, k: usize) -> Result<String, RagError> {
        Ok(self.answer_with_sources(query, k).await?.answer)
    }

    /// Like [`answer`](Self::answer), bounding the whole run by `deadline`.
    pub async fn answer_with_deadline(
        &self,
        query: &str,
        k: usize,
        deadline: Duration,
    ) -> Result<String, RagError> {
        tokio::time::timeout(deadline, self.answer(query, k))
            .await
            .map_err(|_| RagError::timeout("query pipeline", deadline))?
    }

    pub async fn answer_with_sources(&self, query: &str, k: usize) -> Result<RagAnswer, RagError> {
        if query.trim().is_empty() {
            return Err(RagError::InvalidArgument("query must not be empty".to_string()));
        }
        if k == 0 {
            return Err(RagError::InvalidArgument(
                "k must be a positive integer".to_string(),
            ));
        }

        let query_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "rag_query",
            %query_id,
            collection = self.collection.name(),
            k
        );

        async {
            let sources = self
                .settings
                .retry
                .run("retrieve", || self.collection.query(query, k))
                .await?;
            tracing::debug!(hits = sources.len(), "Retrieved context");

            let messages = prompt::build_messages(&sources, query);
            let answer = self
                .settings
                .retry
                .run("generate", || {
                    self.client.generate(messages.clone(), &self.settings.params)
                })
                .await?;

            tracing::info!(
                sources = sources.len(),
                answer_chars = answer.len(),
                "Answered query"
            );
            Ok::<_, RagError>(RagAnswer { answer, sources })
        }
        .instrument(span)
        .await
    }
}
