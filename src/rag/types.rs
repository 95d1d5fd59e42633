use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::errors::RagError;

/// A stored record. Replaced wholesale when upserted again under the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique within a collection.
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub(crate) fn validate(&self, position: usize) -> Result<(), RagError> {
        if self.id.trim().is_empty() {
            return Err(RagError::InvalidArgument(format!(
                "document at position {} has an empty id",
                position
            )));
        }
        if self.content.trim().is_empty() {
            return Err(RagError::InvalidArgument(format!(
                "document '{}' has empty content",
                self.id
            )));
        }
        Ok(())
    }
}

/// One ranked hit. Results are ordered nearest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub id: String,
    pub content: String,
    pub metadata: BTreeMap<String, String>,
    /// 1-based position in the ranking.
    pub rank: usize,
    /// Cosine similarity to the query, in [-1, 1].
    pub similarity: f32,
}

impl QueryResult {
    /// Cosine distance, `1 - similarity`; ascending along a result list.
    pub fn distance(&self) -> f32 {
        1.0 - self.similarity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_rejects_blank_ids_and_content() {
        assert!(Document::new("id_0", "Q: a A: b").validate(0).is_ok());
        assert!(matches!(
            Document::new("  ", "x").validate(3),
            Err(RagError::InvalidArgument(msg)) if msg.contains("position 3")
        ));
        assert!(Document::new("id_1", "").validate(1).is_err());
    }

    #[test]
    fn metadata_deserializes_when_absent() {
        let doc: Document = serde_json::from_str(r#"{"id":"id_0","content":"c"}"#).unwrap();
        assert!(doc.metadata.is_empty());
    }
}
