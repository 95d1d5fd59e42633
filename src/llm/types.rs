use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::errors::RagError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Per-call generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationParams {
    pub fn new(model: impl Into<String>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            temperature,
        }
    }

    pub fn validate(&self) -> Result<(), RagError> {
        if self.model.trim().is_empty() {
            return Err(RagError::InvalidArgument("model must not be empty".to_string()));
        }
        if self.max_tokens == 0 {
            return Err(RagError::InvalidArgument(
                "max_tokens must be positive".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(RagError::InvalidArgument(format!(
                "temperature must be within [0, 2], got {}",
                self.temperature
            )));
        }
        Ok(())
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::new("gpt-4o-mini", 200, 0.7)
    }
}

/// A validated conversation ready to hand to a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub params: GenerationParams,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>, params: GenerationParams) -> Result<Self, RagError> {
        if messages.is_empty() {
            return Err(RagError::InvalidArgument(
                "a conversation needs at least one message".to_string(),
            ));
        }
        params.validate()?;
        Ok(Self { messages, params })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        let message = ChatMessage::system("be brief");
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value, serde_json::json!({ "role": "system", "content": "be brief" }));
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }

    #[test]
    fn params_reject_out_of_range_values() {
        assert!(GenerationParams::default().validate().is_ok());
        assert!(GenerationParams::new("gpt-4o-mini", 0, 0.7).validate().is_err());
        assert!(GenerationParams::new("gpt-4o-mini", 10, 2.1).validate().is_err());
        assert!(GenerationParams::new("gpt-4o-mini", 10, -0.1).validate().is_err());
        assert!(GenerationParams::new("gpt-4o-mini", 10, f32::NAN).validate().is_err());
        assert!(GenerationParams::new(" ", 10, 1.0).validate().is_err());
    }

    #[test]
    fn empty_conversation_is_invalid() {
        let err = ChatRequest::new(Vec::new(), GenerationParams::default()).unwrap_err();
        assert!(matches!(err, RagError::InvalidArgument(_)));
    }
}
