use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use sqlx::{Row, SqlitePool};

use super::sqlite::{self, StoredDocument};
use super::store::{CollectionState, StoreSettings};
use super::types::{Document, QueryResult};
use crate::core::errors::RagError;
use crate::embedding::{EmbeddingBinding, EmbeddingProvider};
use crate::vector_math::rank_descending_by_cosine;

/// Handle to one collection with its embedding provider bound.
///
/// Cheap to clone; every clone shares the collection's lock, so queries run
/// concurrently while an upsert excludes both readers and other writers.
#[derive(Clone)]
pub struct VectorCollection {
    pool: SqlitePool,
    state: Arc<CollectionState>,
    provider: Arc<dyn EmbeddingProvider>,
    settings: StoreSettings,
}

impl VectorCollection {
    pub(crate) fn new(
        pool: SqlitePool,
        state: Arc<CollectionState>,
        provider: Arc<dyn EmbeddingProvider>,
        settings: StoreSettings,
    ) -> Self {
        Self {
            pool,
            state,
            provider,
            settings,
        }
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn binding(&self) -> EmbeddingBinding {
        self.provider.binding()
    }

    /// Stores or replaces `documents`, keyed by id.
    ///
    /// All-or-nothing: every document is validated and embedded before a
    /// single transaction writes them, so a failure leaves the collection as
    /// it was. Within one call a repeated id keeps its last occurrence.
    pub async fn upsert(&self, documents: &[Document]) -> Result<(), RagError> {
        if documents.is_empty() {
            return Ok(());
        }
        for (position, document) in documents.iter().enumerate() {
            document.validate(position)?;
        }

        let documents = last_occurrence_wins(documents);
        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let embeddings = self.embed_batched(&texts).await?;
        let dimension = batch_dimension(&embeddings, self.provider.binding().dimensions)?;

        let _guard = self.state.lock.write().await;
        self.check_stored_dimension(dimension)?;

        let mut tx = self.pool.begin().await.map_err(RagError::storage)?;

        // Bumping next_seq first takes the database write lock, so the stored
        // dimension read back here holds until commit across processes too.
        let row = sqlx::query(
            "UPDATE collections SET next_seq = next_seq + ?1 WHERE name = ?2
             RETURNING next_seq, dimension",
        )
        .bind(documents.len() as i64)
        .bind(self.name())
        .fetch_one(&mut *tx)
        .await
        .map_err(RagError::storage)?;
        let next_seq: i64 = row.get::<i64, _>("next_seq") - documents.len() as i64;
        let stored: Option<i64> = row.get("dimension");

        if let Some(stored) = stored {
            if stored as usize != dimension {
                self.state.dimension.store(stored as usize, Ordering::SeqCst);
                return Err(RagError::ConfigMismatch(format!(
                    "collection '{}' stores {}-dimensional vectors but the provider produced {}",
                    self.name(),
                    stored,
                    dimension
                )));
            }
        }

        for (offset, (document, embedding)) in documents.iter().zip(&embeddings).enumerate() {
            sqlx::query(
                "INSERT INTO documents (collection, id, content, metadata, embedding, seq)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(collection, id) DO UPDATE SET
                    content = excluded.content,
                    metadata = excluded.metadata,
                    embedding = excluded.embedding,
                    updated_at = STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')",
            )
            .bind(self.name())
            .bind(&document.id)
            .bind(&document.content)
            .bind(sqlite::encode_metadata(&document.metadata)?)
            .bind(sqlite::serialize_embedding(embedding))
            .bind(next_seq + offset as i64)
            .execute(&mut *tx)
            .await
            .map_err(RagError::storage)?;
        }

        if stored.is_none() {
            sqlx::query("UPDATE collections SET dimension = ?1 WHERE name = ?2")
                .bind(dimension as i64)
                .bind(self.name())
                .execute(&mut *tx)
                .await
                .map_err(RagError::storage)?;
        }

        tx.commit().await.map_err(RagError::storage)?;
        self.state.dimension.store(dimension, Ordering::SeqCst);

        tracing::info!(
            "Upserted {} documents into '{}' (dimension {})",
            documents.len(),
            self.name(),
            dimension
        );
        Ok(())
    }

    /// Up to `k` nearest documents by cosine similarity, most similar first.
    /// Ties keep insertion order.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<QueryResult>, RagError> {
        self.query_with_deadline(text, k, self.settings.embed_timeout)
            .await
    }

    pub async fn query_with_deadline(
        &self,
        text: &str,
        k: usize,
        deadline: Duration,
    ) -> Result<Vec<QueryResult>, RagError> {
        if k == 0 {
            return Err(RagError::InvalidArgument(
                "k must be a positive integer".to_string(),
            ));
        }

        let _guard = self.state.lock.read().await;
        let documents = sqlite::fetch_documents(&self.pool, self.name()).await?;
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = self.embed_with_deadline(&[text.to_string()], deadline).await?;
        let query_vector = vectors.pop().ok_or_else(|| {
            RagError::EmbeddingFailure("provider returned no vector for the query".to_string())
        })?;
        self.check_stored_dimension(query_vector.len())?;
        ensure_finite(&query_vector)?;

        let candidates: Vec<Vec<f32>> = documents.iter().map(|d| d.embedding.clone()).collect();
        let ranked = rank_descending_by_cosine(&query_vector, &candidates)?;

        let mut documents: Vec<Option<StoredDocument>> = documents.into_iter().map(Some).collect();
        let results: Vec<QueryResult> = ranked
            .into_iter()
            .take(k)
            .enumerate()
            .filter_map(|(position, (idx, similarity))| {
                documents[idx].take().map(|doc| QueryResult {
                    id: doc.id,
                    content: doc.content,
                    metadata: doc.metadata,
                    rank: position + 1,
                    similarity,
                })
            })
            .collect();

        tracing::debug!(
            collection = self.name(),
            k,
            hits = results.len(),
            "Ranked collection"
        );
        Ok(results)
    }

    pub async fn count(&self) -> Result<usize, RagError> {
        let _guard = self.state.lock.read().await;
        sqlite::count_documents(&self.pool, self.name()).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<Document>, RagError> {
        let _guard = self.state.lock.read().await;
        let stored = sqlite::fetch_document(&self.pool, self.name(), id).await?;
        Ok(stored.map(|doc| Document {
            id: doc.id,
            content: doc.content,
            metadata: doc.metadata,
        }))
    }

    /// Removes the given ids, returning how many existed.
    pub async fn delete(&self, ids: &[String]) -> Result<usize, RagError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let _guard = self.state.lock.write().await;
        let mut tx = self.pool.begin().await.map_err(RagError::storage)?;
        let mut removed = 0u64;
        for id in ids {
            let result = sqlx::query("DELETE FROM documents WHERE collection = ?1 AND id = ?2")
                .bind(self.name())
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(RagError::storage)?;
            removed += result.rows_affected();
        }
        tx.commit().await.map_err(RagError::storage)?;

        tracing::info!("Deleted {} documents from '{}'", removed, self.name());
        Ok(removed as usize)
    }

    async fn embed_batched(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.settings.embed_batch_size) {
            let vectors = self
                .embed_with_deadline(chunk, self.settings.embed_timeout)
                .await?;
            embeddings.extend(vectors);
        }
        Ok(embeddings)
    }

    async fn embed_with_deadline(
        &self,
        texts: &[String],
        deadline: Duration,
    ) -> Result<Vec<Vec<f32>>, RagError> {
        let vectors = tokio::time::timeout(deadline, self.provider.embed(texts))
            .await
            .map_err(|_| RagError::timeout("embedding", deadline))??;

        if vectors.len() != texts.len() {
            return Err(RagError::EmbeddingFailure(format!(
                "provider returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }

    fn check_stored_dimension(&self, dimension: usize) -> Result<(), RagError> {
        let stored = self.state.dimension.load(Ordering::SeqCst);
        if stored != 0 && stored != dimension {
            return Err(RagError::ConfigMismatch(format!(
                "collection '{}' stores {}-dimensional vectors but the provider produced {}",
                self.name(),
                stored,
                dimension
            )));
        }
        Ok(())
    }
}

/// Drops earlier duplicates, keeping each id's last document at the position
/// the id first appeared.
fn last_occurrence_wins(documents: &[Document]) -> Vec<Document> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut unique: Vec<Document> = Vec::with_capacity(documents.len());
    for document in documents {
        match positions.get(document.id.as_str()) {
            Some(&idx) => unique[idx] = document.clone(),
            None => {
                positions.insert(&document.id, unique.len());
                unique.push(document.clone());
            }
        }
    }
    unique
}

fn batch_dimension(embeddings: &[Vec<f32>], declared: Option<usize>) -> Result<usize, RagError> {
    let dimension = embeddings.first().map(Vec::len).unwrap_or(0);
    if dimension == 0 {
        return Err(RagError::EmbeddingFailure(
            "provider returned an empty vector".to_string(),
        ));
    }
    if let Some(width) = embeddings.iter().map(Vec::len).find(|len| *len != dimension) {
        return Err(RagError::EmbeddingFailure(format!(
            "provider returned vectors of mixed dimension ({} and {})",
            dimension, width
        )));
    }
    for embedding in embeddings {
        ensure_finite(embedding)?;
    }
    if let Some(declared) = declared {
        if declared != dimension {
            return Err(RagError::ConfigMismatch(format!(
                "provider declares {} dimensions but produced {}",
                declared, dimension
            )));
        }
    }
    Ok(dimension)
}

fn ensure_finite(vector: &[f32]) -> Result<(), RagError> {
    if vector.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(RagError::EmbeddingFailure(
            "provider returned a vector with non-finite components".to_string(),
        ))
    }
}
