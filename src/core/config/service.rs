use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::defaults::RagConfig;
use super::paths::AppPaths;
use super::validation::validate_config;
use crate::core::errors::RagError;

const REDACT_PLACEHOLDER: &str = "****";

const API_KEY_ENV_VARS: [&str; 2] = ["FAQ_RAG_API_KEY", "OPENAI_API_KEY"];

const SENSITIVE_PATTERNS: [&str; 10] = [
    "api_key",
    "secret",
    "password",
    "_token",
    "token_",
    "credential",
    "private_key",
    "access_key",
    "organization",
    "bearer",
];

const SENSITIVE_WHITELIST: [&str; 2] = ["max_tokens", "credentials"];

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("FAQ_RAG_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let user_config = self.paths.user_data_dir.join("config.yml");
        if user_config.exists() {
            return user_config;
        }

        self.paths.project_root.join("config.yml")
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.paths.secrets_path.clone()
    }

    /// Public config with secrets merged over it, before typing.
    pub fn load_raw(&self) -> Value {
        let public_config = load_yaml_file(&self.config_path());
        let secrets_config = load_yaml_file(&self.secrets_path());
        deep_merge(&public_config, &secrets_config)
    }

    pub fn load_config(&self) -> Result<RagConfig, RagError> {
        let env_key = API_KEY_ENV_VARS
            .iter()
            .find_map(|name| env::var(name).ok())
            .filter(|key| !key.trim().is_empty());
        build_config(self.load_raw(), env_key)
    }

    /// Resolves `storage.root` against the data directory.
    pub fn store_root(&self, config: &RagConfig) -> PathBuf {
        match &config.storage.root {
            Some(root) if root.is_absolute() => root.clone(),
            Some(root) => self.paths.user_data_dir.join(root),
            None => self.paths.store_dir.clone(),
        }
    }

    pub fn redact_sensitive_values(&self, value: &Value) -> Value {
        redact_sensitive_values(value)
    }
}

fn build_config(raw: Value, env_key: Option<String>) -> Result<RagConfig, RagError> {
    let mut config: RagConfig = serde_json::from_value(raw)
        .map_err(|e| RagError::Configuration(format!("Invalid config: {}", e)))?;
    if env_key.is_some() {
        config.credentials.api_key = env_key;
    }
    validate_config(&config)?;
    Ok(config)
}

fn load_yaml_file(path: &Path) -> Value {
    if !path.exists() {
        return Value::Object(Map::new());
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<Value>(&contents) {
            Ok(value) => match value {
                Value::Object(_) => value,
                _ => Value::Object(Map::new()),
            },
            Err(err) => {
                tracing::warn!("Ignoring malformed config {}: {}", path.display(), err);
                Value::Object(Map::new())
            }
        },
        Err(_) => Value::Object(Map::new()),
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    if SENSITIVE_WHITELIST
        .iter()
        .any(|allowed| *allowed == key_lower)
    {
        return false;
    }
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service_in(dir: &Path) -> ConfigService {
        ConfigService::new(Arc::new(AppPaths::with_data_dir(
            dir.to_path_buf(),
            dir.to_path_buf(),
        )))
    }

    #[test]
    fn deep_merge_merges_objects_and_overrides_scalars() {
        let base = json!({
            "generation": { "model": "gpt-4o-mini", "max_tokens": 200 },
            "retrieval": { "top_k": 5 }
        });
        let override_value = json!({
            "generation": { "max_tokens": 64 },
            "credentials": { "api_key": "sk-test" }
        });

        let merged = deep_merge(&base, &override_value);

        assert_eq!(
            merged,
            json!({
                "generation": { "model": "gpt-4o-mini", "max_tokens": 64 },
                "retrieval": { "top_k": 5 },
                "credentials": { "api_key": "sk-test" }
            })
        );
    }

    #[test]
    fn redact_sensitive_values_replaces_secrets_only() {
        let input = json!({
            "credentials": { "api_key": "sk-live" },
            "generation": { "max_tokens": 200, "organization": "org-1" }
        });

        assert_eq!(
            redact_sensitive_values(&input),
            json!({
                "credentials": { "api_key": "****" },
                "generation": { "max_tokens": 200, "organization": "****" }
            })
        );
    }

    #[test]
    fn secrets_file_overrides_public_config() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("config.yml"),
            "generation:\n  model: gpt-4o\nretrieval:\n  top_k: 3\n",
        )
        .unwrap();
        fs::write(
            tmp.path().join("secrets.yaml"),
            "credentials:\n  api_key: sk-from-secrets\n",
        )
        .unwrap();

        let service = service_in(tmp.path());
        let config = build_config(service.load_raw(), None).unwrap();

        assert_eq!(config.generation.model, "gpt-4o");
        assert_eq!(config.generation.max_tokens, 200);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.credentials.api_key.as_deref(), Some("sk-from-secrets"));
    }

    #[test]
    fn environment_key_wins_and_invalid_values_fail() {
        let raw = json!({ "credentials": { "api_key": "sk-file" } });
        let config = build_config(raw, Some("sk-env".to_string())).unwrap();
        assert_eq!(config.credentials.api_key.as_deref(), Some("sk-env"));

        let raw = json!({ "generation": { "temperature": 3.0 } });
        assert!(build_config(raw, None).unwrap_err().is_configuration());
    }

    #[test]
    fn relative_store_root_resolves_under_data_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let service = service_in(tmp.path());

        let mut config = RagConfig::default();
        assert_eq!(service.store_root(&config), tmp.path().join("vector_store"));

        config.storage.root = Some(PathBuf::from("chroma_db"));
        assert_eq!(service.store_root(&config), tmp.path().join("chroma_db"));
    }
}
