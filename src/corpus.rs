//! FAQ corpus loading and ingestion.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::errors::RagError;
use crate::rag::{Document, VectorCollection};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqRecord {
    pub question: String,
    pub answer: String,
}

impl FaqRecord {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }

    pub fn content(&self) -> String {
        format!("Q: {} A: {}", self.question, self.answer)
    }
}

/// One document per record: ids `id_0, id_1, ...` in input order, each tagged
/// with `source = corpus_name`.
pub fn to_documents(records: &[FaqRecord], corpus_name: &str) -> Vec<Document> {
    records
        .iter()
        .enumerate()
        .map(|(idx, record)| {
            Document::new(format!("id_{}", idx), record.content()).with_metadata("source", corpus_name)
        })
        .collect()
}

/// Reads a JSON array of `{question, answer}` records.
pub fn load_corpus(path: &Path) -> Result<Vec<FaqRecord>, RagError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        RagError::InvalidArgument(format!("cannot read corpus {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        RagError::InvalidArgument(format!("corpus {} is not a list of FAQ records: {}", path.display(), e))
    })
}

/// Converts and upserts `records` in one call, returning how many were stored.
pub async fn ingest(
    collection: &VectorCollection,
    records: &[FaqRecord],
    corpus_name: &str,
) -> Result<usize, RagError> {
    let documents = to_documents(records, corpus_name);
    collection.upsert(&documents).await?;
    tracing::info!(
        "Ingested {} records from '{}' into '{}'",
        documents.len(),
        corpus_name,
        collection.name()
    );
    Ok(documents.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_become_sequential_tagged_documents() {
        let records = vec![
            FaqRecord::new("What is car insurance?", "It protects you financially."),
            FaqRecord::new("Is it mandatory?", "Third-party cover is."),
        ];

        let docs = to_documents(&records, "car_faq_data");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "id_0");
        assert_eq!(
            docs[0].content,
            "Q: What is car insurance? A: It protects you financially."
        );
        assert_eq!(docs[1].id, "id_1");
        assert_eq!(
            docs[1].metadata.get("source").map(String::as_str),
            Some("car_faq_data")
        );
    }

    #[test]
    fn empty_corpus_gives_no_documents() {
        assert!(to_documents(&[], "car_faq_data").is_empty());
    }

    #[test]
    fn load_corpus_reads_json_records() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("faqs.json");
        std::fs::write(
            &path,
            r#"[{"question": "What is car insurance?", "answer": "Cover."}]"#,
        )
        .unwrap();

        let records = load_corpus(&path).unwrap();
        assert_eq!(records, vec![FaqRecord::new("What is car insurance?", "Cover.")]);
    }

    #[test]
    fn malformed_corpus_is_invalid_argument() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("faqs.json");
        std::fs::write(&path, r#"{"question": "not a list"}"#).unwrap();

        assert!(matches!(
            load_corpus(&path),
            Err(RagError::InvalidArgument(_))
        ));
        assert!(load_corpus(&tmp.path().join("missing.json")).is_err());
    }
}
