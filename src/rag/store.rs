//! `VectorStore`: named, durable collections under one storage root.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::sync::{Mutex, RwLock};

use super::collection::VectorCollection;
use super::sqlite::{self, DB_FILE_NAME};
use crate::core::config::RagConfig;
use crate::core::errors::RagError;
use crate::embedding::{EmbeddingBinding, EmbeddingProvider};

#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Deadline applied to each embedding call unless the caller passes one.
    pub embed_timeout: Duration,
    /// Maximum texts per embedding request.
    pub embed_batch_size: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            embed_timeout: Duration::from_secs(30),
            embed_batch_size: 64,
        }
    }
}

impl StoreSettings {
    pub fn from_config(config: &RagConfig) -> Self {
        Self {
            embed_timeout: config.embedding.timeout(),
            embed_batch_size: config.embedding.batch_size,
        }
    }
}

/// State shared by every handle to one collection.
pub(crate) struct CollectionState {
    pub name: String,
    /// Guards document writes: upserts take it exclusively, queries shared.
    pub lock: RwLock<()>,
    /// Persisted vector width, 0 until the first upsert fixes it.
    pub dimension: AtomicUsize,
}

struct BoundCollection {
    state: Arc<CollectionState>,
    provider: Arc<dyn EmbeddingProvider>,
}

pub struct VectorStore {
    pool: SqlitePool,
    root: PathBuf,
    settings: StoreSettings,
    collections: Mutex<HashMap<String, BoundCollection>>,
}

impl VectorStore {
    /// Opens (creating if needed) the store rooted at `root`.
    pub async fn open(root: impl AsRef<Path>, settings: StoreSettings) -> Result<Self, RagError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| {
            RagError::StorageUnavailable(format!("cannot create {}: {}", root.display(), e))
        })?;
        if settings.embed_batch_size == 0 {
            return Err(RagError::InvalidArgument(
                "embed_batch_size must be positive".to_string(),
            ));
        }

        let pool = sqlite::connect(&root.join(DB_FILE_NAME)).await?;
        tracing::info!("Opened vector store at {}", root.display());

        Ok(Self {
            pool,
            root,
            settings,
            collections: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    /// Loads `name` if it exists, creating it empty otherwise, and binds
    /// `provider` for every later upsert and query through the returned handle.
    ///
    /// Loading re-validates the binding: a provider/model different from the
    /// one the collection was created with is a `ConfigMismatch`, as is a
    /// declared dimension that disagrees with the vectors already stored.
    pub async fn create_or_load(
        &self,
        name: &str,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<VectorCollection, RagError> {
        if name.trim().is_empty() {
            return Err(RagError::InvalidArgument(
                "collection name must not be empty".to_string(),
            ));
        }

        let binding = provider.binding();
        let mut collections = self.collections.lock().await;

        let dimension = match sqlite::fetch_collection(&self.pool, name).await? {
            Some(record) => {
                check_binding(name, &record.binding, record.dimension, &binding)?;
                tracing::info!(
                    "Loaded collection '{}' ({}, dimension {:?})",
                    name,
                    binding,
                    record.dimension
                );
                record.dimension
            }
            None => {
                sqlite::insert_collection(&self.pool, name, &binding).await?;
                tracing::info!("Created collection '{}' bound to {}", name, binding);
                None
            }
        };

        let state = match collections.get(name) {
            Some(bound) => bound.state.clone(),
            None => Arc::new(CollectionState {
                name: name.to_string(),
                lock: RwLock::new(()),
                dimension: AtomicUsize::new(dimension.unwrap_or(0)),
            }),
        };

        collections.insert(
            name.to_string(),
            BoundCollection {
                state: state.clone(),
                provider: provider.clone(),
            },
        );

        Ok(VectorCollection::new(
            self.pool.clone(),
            state,
            provider,
            self.settings.clone(),
        ))
    }

    /// Handle to a collection already bound in this process.
    pub async fn collection(&self, name: &str) -> Result<VectorCollection, RagError> {
        let collections = self.collections.lock().await;
        let bound = collections.get(name).ok_or_else(|| {
            RagError::NotInitialized(format!(
                "collection '{}' has no embedding provider bound; call create_or_load first",
                name
            ))
        })?;

        Ok(VectorCollection::new(
            self.pool.clone(),
            bound.state.clone(),
            bound.provider.clone(),
            self.settings.clone(),
        ))
    }

    /// Every collection persisted under this root, bound or not.
    pub async fn list_collections(&self) -> Result<Vec<String>, RagError> {
        sqlite::list_collections(&self.pool).await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn check_binding(
    name: &str,
    stored: &EmbeddingBinding,
    stored_dimension: Option<usize>,
    requested: &EmbeddingBinding,
) -> Result<(), RagError> {
    if !stored.is_compatible_with(requested) {
        return Err(RagError::ConfigMismatch(format!(
            "collection '{}' was created with {}, cannot load it with {}",
            name, stored, requested
        )));
    }

    if let (Some(stored_dimension), Some(declared)) = (stored_dimension, requested.dimensions) {
        if stored_dimension != declared {
            return Err(RagError::ConfigMismatch(format!(
                "collection '{}' stores {}-dimensional vectors but {} produces {}",
                name, stored_dimension, requested, declared
            )));
        }
    }

    Ok(())
}
