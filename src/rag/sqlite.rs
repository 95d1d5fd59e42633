//! SQLite persistence for vector collections.
//!
//! One database file per store root. Embeddings are stored as little-endian
//! f32 blobs next to their document; similarity search is a brute-force
//! cosine scan over a collection's rows.

use std::collections::BTreeMap;
use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use crate::core::errors::RagError;
use crate::embedding::EmbeddingBinding;

pub(crate) const DB_FILE_NAME: &str = "store.db";

/// Collection row as persisted.
#[derive(Debug, Clone)]
pub(crate) struct CollectionRecord {
    pub binding: EmbeddingBinding,
    pub dimension: Option<usize>,
}

/// Document row with its decoded embedding.
#[derive(Debug, Clone)]
pub(crate) struct StoredDocument {
    pub id: String,
    pub content: String,
    pub metadata: BTreeMap<String, String>,
    pub embedding: Vec<f32>,
}

pub(crate) async fn connect(db_path: &Path) -> Result<SqlitePool, RagError> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(4)
        .connect_with(options)
        .await
        .map_err(|e| {
            RagError::StorageUnavailable(format!("cannot open {}: {}", db_path.display(), e))
        })?;

    init_schema(&pool).await?;
    Ok(pool)
}

async fn init_schema(pool: &SqlitePool) -> Result<(), RagError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS collections (
            name TEXT PRIMARY KEY,
            provider TEXT NOT NULL,
            model TEXT NOT NULL,
            dimension INTEGER,
            next_seq INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )",
    )
    .execute(pool)
    .await
    .map_err(RagError::storage)?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL REFERENCES collections(name) ON DELETE CASCADE,
            id TEXT NOT NULL,
            content TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}',
            embedding BLOB NOT NULL,
            seq INTEGER NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')),
            PRIMARY KEY (collection, id)
        )",
    )
    .execute(pool)
    .await
    .map_err(RagError::storage)?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_seq ON documents(collection, seq)")
        .execute(pool)
        .await
        .map_err(RagError::storage)?;

    Ok(())
}

pub(crate) async fn fetch_collection(
    pool: &SqlitePool,
    name: &str,
) -> Result<Option<CollectionRecord>, RagError> {
    let row = sqlx::query("SELECT provider, model, dimension FROM collections WHERE name = ?1")
        .bind(name)
        .fetch_optional(pool)
        .await
        .map_err(RagError::storage)?;

    Ok(row.map(|row| {
        let dimension: Option<i64> = row.get("dimension");
        CollectionRecord {
            binding: EmbeddingBinding::new(
                row.get::<String, _>("provider"),
                row.get::<String, _>("model"),
            ),
            dimension: dimension.map(|d| d as usize),
        }
    }))
}

pub(crate) async fn insert_collection(
    pool: &SqlitePool,
    name: &str,
    binding: &EmbeddingBinding,
) -> Result<(), RagError> {
    sqlx::query("INSERT INTO collections (name, provider, model) VALUES (?1, ?2, ?3)")
        .bind(name)
        .bind(&binding.provider)
        .bind(&binding.model)
        .execute(pool)
        .await
        .map_err(RagError::storage)?;
    Ok(())
}

pub(crate) async fn list_collections(pool: &SqlitePool) -> Result<Vec<String>, RagError> {
    sqlx::query_scalar("SELECT name FROM collections ORDER BY name")
        .fetch_all(pool)
        .await
        .map_err(RagError::storage)
}

pub(crate) async fn count_documents(pool: &SqlitePool, collection: &str) -> Result<usize, RagError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection = ?1")
        .bind(collection)
        .fetch_one(pool)
        .await
        .map_err(RagError::storage)?;
    Ok(count as usize)
}

/// All documents of a collection in insertion order.
pub(crate) async fn fetch_documents(
    pool: &SqlitePool,
    collection: &str,
) -> Result<Vec<StoredDocument>, RagError> {
    let rows = sqlx::query(
        "SELECT id, content, metadata, embedding
         FROM documents
         WHERE collection = ?1
         ORDER BY seq ASC",
    )
    .bind(collection)
    .fetch_all(pool)
    .await
    .map_err(RagError::storage)?;

    rows.iter().map(row_to_document).collect()
}

pub(crate) async fn fetch_document(
    pool: &SqlitePool,
    collection: &str,
    id: &str,
) -> Result<Option<StoredDocument>, RagError> {
    let row = sqlx::query(
        "SELECT id, content, metadata, embedding
         FROM documents
         WHERE collection = ?1 AND id = ?2",
    )
    .bind(collection)
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(RagError::storage)?;

    row.as_ref().map(row_to_document).transpose()
}

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Result<StoredDocument, RagError> {
    let id: String = row.get("id");
    let metadata_str: String = row.get("metadata");
    let metadata = decode_metadata(&metadata_str)
        .map_err(|e| RagError::StorageUnavailable(format!("corrupt metadata for '{}': {}", id, e)))?;
    let embedding_bytes: Vec<u8> = row.get("embedding");
    let embedding = deserialize_embedding(&embedding_bytes).ok_or_else(|| {
        RagError::StorageUnavailable(format!("corrupt embedding for '{}'", id))
    })?;

    Ok(StoredDocument {
        id,
        content: row.get("content"),
        metadata,
        embedding,
    })
}

pub(crate) fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub(crate) fn deserialize_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

pub(crate) fn encode_metadata(metadata: &BTreeMap<String, String>) -> Result<String, RagError> {
    serde_json::to_string(metadata).map_err(RagError::storage)
}

fn decode_metadata(raw: &str) -> Result<BTreeMap<String, String>, serde_json::Error> {
    serde_json::from_str(raw)
}
