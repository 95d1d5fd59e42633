use std::fmt::Display;

use super::defaults::RagConfig;
use crate::core::errors::RagError;

const EMBEDDING_PROVIDERS: [&str; 2] = ["openai", "local"];

pub fn validate_config(config: &RagConfig) -> Result<(), RagError> {
    validate_non_empty("storage.collection", &config.storage.collection)?;

    let embedding = &config.embedding;
    if !EMBEDDING_PROVIDERS.contains(&embedding.provider.as_str()) {
        return Err(RagError::Configuration(format!(
            "Invalid config at 'embedding.provider': expected one of {:?}, got '{}'",
            EMBEDDING_PROVIDERS, embedding.provider
        )));
    }
    validate_non_empty("embedding.model", &embedding.model)?;
    validate_base_url("embedding.base_url", &embedding.base_url)?;
    validate_range("embedding.timeout_secs", embedding.timeout_secs, 1, 86_400)?;
    validate_range("embedding.batch_size", embedding.batch_size, 1, 2048)?;
    validate_range("embedding.dimensions", embedding.dimensions, 1, 65_536)?;

    let generation = &config.generation;
    validate_non_empty("generation.model", &generation.model)?;
    validate_base_url("generation.base_url", &generation.base_url)?;
    validate_range("generation.max_tokens", generation.max_tokens, 1, 1_000_000)?;
    validate_range("generation.temperature", generation.temperature, 0.0, 2.0)?;
    validate_range("generation.timeout_secs", generation.timeout_secs, 1, 86_400)?;

    validate_range("retrieval.top_k", config.retrieval.top_k, 1, 10_000)?;

    validate_range("retry.max_attempts", config.retry.max_attempts, 1, 20)?;
    validate_range("retry.initial_backoff_ms", config.retry.initial_backoff_ms, 0, 600_000)?;
    validate_range("retry.multiplier", config.retry.multiplier, 1.0, 16.0)?;

    validate_non_empty("corpus.name", &config.corpus.name)?;

    Ok(())
}

fn validate_range<T: PartialOrd + Display>(
    path: &str,
    value: T,
    min: T,
    max: T,
) -> Result<(), RagError> {
    // NaN fails both comparisons, so test for membership rather than exclusion.
    if value >= min && value <= max {
        return Ok(());
    }
    Err(RagError::Configuration(format!(
        "Invalid config at '{}': must be between {} and {}, got {}",
        path, min, max, value
    )))
}

fn validate_non_empty(path: &str, value: &str) -> Result<(), RagError> {
    if value.trim().is_empty() {
        return Err(RagError::Configuration(format!(
            "Invalid config at '{}': value cannot be empty",
            path
        )));
    }
    Ok(())
}

fn validate_base_url(path: &str, value: &str) -> Result<(), RagError> {
    validate_non_empty(path, value)?;
    if value.starts_with("http://") || value.starts_with("https://") {
        return Ok(());
    }
    Err(RagError::Configuration(format!(
        "Invalid config at '{}': expected an http(s) URL",
        path
    )))
}
