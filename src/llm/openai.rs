use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use serde_json::{json, Value};

use super::client::{ClientConfig, ProviderConnector};
use super::provider::{BlockingGenerationProvider, GenerationProvider};
use super::types::ChatRequest;
use crate::core::errors::RagError;

const PROVIDER_NAME: &str = "openai";
const DEFAULT_USER_AGENT: &str = concat!("faq-rag/", env!("CARGO_PKG_VERSION"));

/// Builds OpenAI-compatible chat providers from a [`ClientConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiConnector;

impl ProviderConnector for OpenAiConnector {
    fn connect(&self, config: &ClientConfig) -> Result<Arc<dyn GenerationProvider>, RagError> {
        let client = reqwest::Client::builder()
            .default_headers(default_headers(config)?)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RagError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Arc::new(OpenAiProvider {
            endpoint: completions_url(&config.base_url),
            timeout: config.request_timeout,
            client,
        }))
    }

    fn connect_blocking(
        &self,
        config: &ClientConfig,
    ) -> Result<Arc<dyn BlockingGenerationProvider>, RagError> {
        let client = reqwest::blocking::Client::builder()
            .default_headers(default_headers(config)?)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RagError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Arc::new(OpenAiBlockingProvider {
            endpoint: completions_url(&config.base_url),
            client,
        }))
    }
}

pub struct OpenAiProvider {
    endpoint: String,
    timeout: Duration,
    client: reqwest::Client,
}

pub struct OpenAiBlockingProvider {
    endpoint: String,
    client: reqwest::blocking::Client,
}

#[async_trait]
impl GenerationProvider for OpenAiProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, RagError> {
        let res = self
            .client
            .post(&self.endpoint)
            .json(&completion_body(request))
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }

        let payload: Value = res.json().await.map_err(RagError::provider)?;
        parse_completion(&payload)
    }
}

impl BlockingGenerationProvider for OpenAiBlockingProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn complete_blocking(&self, request: &ChatRequest, timeout: Duration) -> Result<String, RagError> {
        let res = self
            .client
            .post(&self.endpoint)
            .timeout(timeout)
            .json(&completion_body(request))
            .send()
            .map_err(|e| transport_error(e, timeout))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().unwrap_or_default();
            return Err(status_error(status, &text));
        }

        let payload: Value = res.json().map_err(RagError::provider)?;
        parse_completion(&payload)
    }
}

fn completions_url(base_url: &str) -> String {
    format!("{}/v1/chat/completions", base_url.trim_end_matches('/'))
}

fn default_headers(config: &ClientConfig) -> Result<HeaderMap, RagError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        header_value(&format!("Bearer {}", config.api_key.trim()), "api_key")?,
    );
    if let Some(organization) = &config.organization {
        headers.insert("OpenAI-Organization", header_value(organization, "organization")?);
    }
    let agent = config.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
    headers.insert(USER_AGENT, header_value(agent, "user_agent")?);
    Ok(headers)
}

fn header_value(value: &str, option: &str) -> Result<HeaderValue, RagError> {
    HeaderValue::from_str(value).map_err(|_| {
        RagError::Configuration(format!("'{}' contains invalid header characters", option))
    })
}

fn completion_body(request: &ChatRequest) -> Value {
    json!({
        "model": request.params.model,
        "messages": request.messages,
        "max_tokens": request.params.max_tokens,
        "temperature": request.params.temperature,
        "n": 1,
        "stream": false,
    })
}

fn parse_completion(payload: &Value) -> Result<String, RagError> {
    payload["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| RagError::provider("completion response contained no message content"))
}

fn transport_error(err: reqwest::Error, timeout: Duration) -> RagError {
    if err.is_timeout() {
        RagError::timeout("chat completion", timeout)
    } else {
        RagError::provider(err)
    }
}

fn status_error(status: reqwest::StatusCode, body: &str) -> RagError {
    RagError::Provider(format!("OpenAI chat error ({}): {}", status, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::{ChatMessage, GenerationParams};

    fn config() -> ClientConfig {
        ClientConfig::new("sk-test")
    }

    #[test]
    fn body_carries_messages_and_sampling_settings() {
        let request = ChatRequest::new(
            vec![ChatMessage::system("sys"), ChatMessage::user("hi")],
            GenerationParams::new("gpt-4o-mini", 200, 0.5),
        )
        .unwrap();

        let body = completion_body(&request);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 200);
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn parse_returns_first_choice_text_verbatim() {
        let payload = json!({
            "choices": [
                { "message": { "role": "assistant", "content": "  It protects you.  " } },
                { "message": { "role": "assistant", "content": "ignored" } }
            ]
        });
        assert_eq!(parse_completion(&payload).unwrap(), "  It protects you.  ");
    }

    #[test]
    fn missing_choice_is_a_provider_error_not_empty_text() {
        let err = parse_completion(&json!({ "choices": [] })).unwrap_err();
        assert!(matches!(err, RagError::Provider(_)));
    }

    #[test]
    fn headers_apply_client_options() {
        let mut config = config();
        config.organization = Some("org-123".to_string());
        config.user_agent = Some("faq-cli/1".to_string());

        let headers = default_headers(&config).unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer sk-test");
        assert_eq!(headers["OpenAI-Organization"], "org-123");
        assert_eq!(headers[USER_AGENT], "faq-cli/1");
    }

    #[test]
    fn completions_url_tolerates_trailing_slash() {
        assert_eq!(
            completions_url("http://localhost:1234/"),
            "http://localhost:1234/v1/chat/completions"
        );
    }

    #[tokio::test]
    #[ignore]
    async fn test_live_openai_completion() {
        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        let provider = OpenAiConnector
            .connect(&ClientConfig::new(api_key))
            .expect("client should build");
        let request = ChatRequest::new(
            vec![ChatMessage::user("Say hello")],
            GenerationParams::new("gpt-4o-mini", 10, 0.0),
        )
        .unwrap();

        match provider.complete(&request).await {
            Ok(response) => println!("OpenAI response: {}", response),
            Err(e) => panic!("OpenAI request failed: {}", e),
        }
    }
}
