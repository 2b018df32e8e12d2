use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Returned when a generation reply carries no usable text.
pub const NO_RESPONSE_PLACEHOLDER: &str = "No response generated";

/// Fields checked, in order, when a provider replies with an object instead of a string.
const TEXT_FIELDS: [&str; 4] = ["content", "text", "response", "output"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
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
}

/// Raw reply of a generation provider: either plain text or a structured object
/// whose text lives under one of several field names.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum GenerationOutput {
    Text(String),
    Structured(Value),
}

impl GenerationOutput {
    /// Extracts the reply text, falling back to [`NO_RESPONSE_PLACEHOLDER`].
    pub fn into_text(self) -> String {
        let text = match self {
            GenerationOutput::Text(text) => Some(text),
            GenerationOutput::Structured(value) => extract_text(&value),
        };

        match text {
            Some(text) if !text.trim().is_empty() => text,
            _ => NO_RESPONSE_PLACEHOLDER.to_string(),
        }
    }
}

fn extract_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Object(map) => TEXT_FIELDS
            .iter()
            .filter_map(|field| map.get(*field))
            .filter_map(text_of_field)
            .find(|text| !text.trim().is_empty()),
        _ => None,
    }
}

fn text_of_field(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        // Content-part arrays: concatenate every part's text
        Value::Array(parts) => {
            let text = parts
                .iter()
                .filter_map(|part| match part {
                    Value::String(text) => Some(text.as_str()),
                    other => other.get("text").and_then(|t| t.as_str()),
                })
                .collect::<Vec<_>>()
                .join("");
            Some(text)
        }
        _ => None,
    }
}

/// Generic trait for clients that turn a role-tagged conversation into generated text
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send the full conversation and return the provider's raw reply
    async fn generate(&self, messages: &[ChatMessage]) -> Result<GenerationOutput>;

    /// Get the name of the client (for logging purposes)
    fn client_name(&self) -> &str;
}

/// Wrapper enum that implements ChatClient for different provider clients
pub enum AnyChatClient {
    Gemini(crate::gemini::GeminiClient),
    OpenAI(crate::openai::OpenAIClient),
    Mock(crate::mock_llm::MockLLMClient),
}

#[async_trait]
impl ChatClient for AnyChatClient {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<GenerationOutput> {
        match self {
            AnyChatClient::Gemini(client) => client.generate(messages).await,
            AnyChatClient::OpenAI(client) => client.generate(messages).await,
            AnyChatClient::Mock(client) => client.generate(messages).await,
        }
    }

    fn client_name(&self) -> &str {
        match self {
            AnyChatClient::Gemini(_) => "Gemini",
            AnyChatClient::OpenAI(_) => "OpenAI",
            AnyChatClient::Mock(_) => "MockLLM",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_text_passes_through() {
        let output = GenerationOutput::Text("Try the headphones.".to_string());
        assert_eq!(output.into_text(), "Try the headphones.");
    }

    #[test]
    fn test_structured_content_field() {
        let output = GenerationOutput::Structured(json!({"role": "assistant", "content": "hello"}));
        assert_eq!(output.into_text(), "hello");
    }

    #[test]
    fn test_structured_text_field_when_content_missing() {
        let output = GenerationOutput::Structured(json!({"text": "from text"}));
        assert_eq!(output.into_text(), "from text");
    }

    #[test]
    fn test_null_content_falls_through_to_next_field() {
        let output = GenerationOutput::Structured(json!({"content": null, "text": "fallback"}));
        assert_eq!(output.into_text(), "fallback");
    }

    #[test]
    fn test_content_parts_are_concatenated() {
        let output = GenerationOutput::Structured(json!({
            "content": [{"type": "text", "text": "Hello, "}, {"type": "text", "text": "world"}]
        }));
        assert_eq!(output.into_text(), "Hello, world");
    }

    #[test]
    fn test_unusable_shapes_yield_placeholder() {
        assert_eq!(GenerationOutput::Text("   ".to_string()).into_text(), NO_RESPONSE_PLACEHOLDER);
        assert_eq!(
            GenerationOutput::Structured(json!({"unexpected": 1})).into_text(),
            NO_RESPONSE_PLACEHOLDER
        );
        assert_eq!(GenerationOutput::Structured(json!(42)).into_text(), NO_RESPONSE_PLACEHOLDER);
    }

    #[test]
    fn test_untagged_deserialization() {
        let text: GenerationOutput = serde_json::from_value(json!("plain")).unwrap();
        assert_eq!(text, GenerationOutput::Text("plain".to_string()));

        let object: GenerationOutput = serde_json::from_value(json!({"text": "x"})).unwrap();
        assert!(matches!(object, GenerationOutput::Structured(_)));
    }

    #[test]
    fn test_message_roles_serialize_lowercase() {
        let value = serde_json::to_value(ChatMessage::system("be brief")).unwrap();
        assert_eq!(value, json!({"role": "system", "content": "be brief"}));
    }
}
