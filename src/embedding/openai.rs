use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::{EmbeddingBinding, EmbeddingProvider};
use crate::core::errors::RagError;

const PROVIDER_NAME: &str = "openai";

#[derive(Clone)]
pub struct OpenAiEmbeddingProvider {
    base_url: String,
    model: String,
    timeout: Duration,
    client: Client,
}

impl OpenAiEmbeddingProvider {
    pub fn new(
        api_key: &str,
        model: impl Into<String>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, RagError> {
        if api_key.trim().is_empty() {
            return Err(RagError::Configuration(
                "An API key is required for the OpenAI embedding provider".to_string(),
            ));
        }

        let mut headers = reqwest::header::HeaderMap::new();
        let auth = reqwest::header::HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|_| {
                RagError::Configuration("API key contains invalid header characters".to_string())
            })?;
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| RagError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            timeout,
            client,
        })
    }
}

/// Output width of the hosted models we know about.
fn known_dimensions(model: &str) -> Option<usize> {
    match model {
        "text-embedding-ada-002" | "text-embedding-3-small" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

fn parse_embeddings(payload: &Value, expected: usize) -> Result<Vec<Vec<f32>>, RagError> {
    let data = payload["data"]
        .as_array()
        .ok_or_else(|| RagError::embedding("response has no 'data' array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item["index"].as_u64().map(|i| i as usize).unwrap_or(position);
        let values = item["embedding"]
            .as_array()
            .ok_or_else(|| RagError::embedding(format!("item {} has no embedding", index)))?;
        let vector = values
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect::<Option<Vec<f32>>>()
            .ok_or_else(|| RagError::embedding(format!("item {} has non-numeric values", index)))?;
        indexed.push((index, vector));
    }

    if indexed.len() != expected {
        return Err(RagError::EmbeddingFailure(format!(
            "expected {} embeddings, got {}",
            expected,
            indexed.len()
        )));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, vector)| vector).collect())
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    fn binding(&self) -> EmbeddingBinding {
        let binding = EmbeddingBinding::new(PROVIDER_NAME, &self.model);
        match known_dimensions(&self.model) {
            Some(dimensions) => binding.with_dimensions(dimensions),
            None => binding,
        }
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": texts,
        });

        let res = self.client.post(&url).json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                RagError::timeout("embedding request", self.timeout)
            } else {
                RagError::embedding(e)
            }
        })?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(RagError::EmbeddingFailure(format!(
                "OpenAI embed error ({}): {}",
                status, text
            )));
        }

        let payload: Value = res.json().await.map_err(RagError::embedding)?;
        parse_embeddings(&payload, texts.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_api_key_is_rejected_before_any_request() {
        let err = OpenAiEmbeddingProvider::new(
            "  ",
            "text-embedding-ada-002",
            "https://api.openai.com",
            Duration::from_secs(5),
        )
        .err()
        .unwrap();
        assert!(matches!(err, RagError::Configuration(_)));
    }

    #[test]
    fn binding_declares_known_dimensions() {
        let provider = OpenAiEmbeddingProvider::new(
            "sk-test",
            "text-embedding-ada-002",
            "https://api.openai.com/",
            Duration::from_secs(5),
        )
        .unwrap();
        let binding = provider.binding();
        assert_eq!(binding.provider, "openai");
        assert_eq!(binding.dimensions, Some(1536));
        assert_eq!(provider.base_url, "https://api.openai.com");
    }

    #[test]
    fn parse_orders_by_index() {
        let payload = json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] }
            ]
        });
        let vectors = parse_embeddings(&payload, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn parse_rejects_short_responses() {
        let payload = json!({ "data": [ { "index": 0, "embedding": [1.0] } ] });
        let err = parse_embeddings(&payload, 2).unwrap_err();
        assert!(matches!(err, RagError::EmbeddingFailure(_)));

        let err = parse_embeddings(&json!({ "error": "quota" }), 1).unwrap_err();
        assert!(matches!(err, RagError::EmbeddingFailure(_)));
    }
}
