//! Durable vector collections.
//!
//! - `VectorStore`: opens the SQLite store under a root and hands out collections
//! - `VectorCollection`: upsert and cosine nearest-neighbour query over one collection
//! - `Document` / `QueryResult`: the records going in and coming out

mod collection;
mod sqlite;
mod store;
mod types;

pub use collection::VectorCollection;
pub use store::{StoreSettings, VectorStore};
pub use types::{Document, QueryResult};
