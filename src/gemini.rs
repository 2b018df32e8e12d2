use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

use crate::chat_client::{ChatMessage, GenerationOutput, Role};
use crate::error::RagError;

const API_KEY_HEADER: &str = "x-goog-api-key";

pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    embedding_model: String,
    base_url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: Option<GenerationConfig>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
}

#[derive(Debug, Serialize, Clone)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "topK")]
    top_k: i32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: i32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Serialize)]
struct EmbedContentRequest {
    model: String,
    content: Content,
}

#[derive(Debug, Serialize)]
struct BatchEmbedContentsRequest {
    requests: Vec<EmbedContentRequest>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedContentsResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

fn text_content(role: Option<&str>, text: &str) -> Content {
    Content {
        role: role.map(str::to_string),
        parts: vec![Part {
            text: Some(text.to_string()),
        }],
    }
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
        }
    }

    pub fn with_embedding_model(mut self, embedding_model: String) -> Self {
        self.embedding_model = embedding_model;
        self
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/{}:{}", self.base_url, model, method)
    }

    /// The key travels in a header, never in the URL.
    fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url).header(API_KEY_HEADER, &self.api_key)
    }

    async fn send<T: Serialize>(&self, url: &str, body: &T) -> Result<Response> {
        let response = self
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(RagError::transport)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RagError::status(status, &error_text).into());
        }
        Ok(response)
    }

    fn build_request(messages: &[ChatMessage]) -> GenerateContentRequest {
        // Gemini takes system turns out-of-band as a single instruction
        let system_parts: Vec<Part> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| Part {
                text: Some(m.content.clone()),
            })
            .collect();

        let contents = messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| text_content(Some("user"), &m.content))
            .collect();

        GenerateContentRequest {
            contents,
            generation_config: Some(GenerationConfig {
                temperature: 0.7,
                top_p: 0.95,
                top_k: 40,
                max_output_tokens: 2048,
            }),
            system_instruction: if system_parts.is_empty() {
                None
            } else {
                Some(SystemInstruction { parts: system_parts })
            },
        }
    }

    pub async fn generate(&self, messages: &[ChatMessage]) -> Result<GenerationOutput> {
        let url = self.endpoint(&self.model, "generateContent");

        let request = Self::build_request(messages);
        tracing::debug!(model = %self.model, messages = messages.len(), "Gemini generateContent request");

        let response = self.send(&url, &request).await?;
        let raw: serde_json::Value = response.json().await.map_err(RagError::transport)?;
        Ok(Self::parse_generation(raw))
    }

    fn parse_generation(raw: serde_json::Value) -> GenerationOutput {
        let Ok(api_response) = serde_json::from_value::<GenerateContentResponse>(raw.clone()) else {
            return GenerationOutput::Structured(raw);
        };

        let text: Option<String> = api_response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            });

        match text {
            Some(text) => GenerationOutput::Text(text),
            None => GenerationOutput::Structured(raw),
        }
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let url = self.endpoint(&self.embedding_model, "embedContent");

        let request = EmbedContentRequest {
            model: format!("models/{}", self.embedding_model),
            content: text_content(None, text),
        };

        let response = self.send(&url, &request).await?;

        let api_response: EmbedContentResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Invalid embedding response format: {}", e.without_url()))?;
        Ok(api_response.embedding.values)
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = self.endpoint(&self.embedding_model, "batchEmbedContents");

        let request = BatchEmbedContentsRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: format!("models/{}", self.embedding_model),
                    content: text_content(None, text),
                })
                .collect(),
        };

        let response = self.send(&url, &request).await?;

        let api_response: BatchEmbedContentsResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Invalid embedding response format: {}", e.without_url()))?;

        if api_response.embeddings.len() != texts.len() {
            return Err(anyhow!(
                "Expected {} embeddings, got {}",
                texts.len(),
                api_response.embeddings.len()
            ));
        }

        Ok(api_response.embeddings.into_iter().map(|e| e.values).collect())
    }
}

#[async_trait]
impl crate::chat_client::ChatClient for GeminiClient {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<GenerationOutput> {
        self.generate(messages).await
    }

    fn client_name(&self) -> &str {
        "Gemini"
    }
}

#[async_trait]
impl crate::embedding::Embedder for GeminiClient {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed_many(texts).await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_one(text).await
    }

    fn embedder_name(&self) -> &str {
        "Gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_system_messages_become_system_instruction() {
        let request = GeminiClient::build_request(&[
            ChatMessage::system("You recommend products."),
            ChatMessage::user("headphones?"),
        ]);

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value["systemInstruction"]["parts"][0]["text"],
            "You recommend products."
        );
        assert_eq!(value["contents"].as_array().unwrap().len(), 1);
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "headphones?");
    }

    #[test]
    fn test_parse_generation_joins_parts() {
        let raw = json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "Try "}, {"text": "these."}]}}]
        });
        assert_eq!(
            GeminiClient::parse_generation(raw),
            GenerationOutput::Text("Try these.".to_string())
        );
    }

    #[test]
    fn test_parse_generation_without_candidates_is_structured() {
        let raw = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let output = GeminiClient::parse_generation(raw);
        assert!(matches!(output, GenerationOutput::Structured(_)));
        assert_eq!(output.into_text(), crate::chat_client::NO_RESPONSE_PLACEHOLDER);
    }

    #[test]
    fn test_api_key_sent_as_header_not_query() {
        let client = GeminiClient::new("secret-key".to_string(), DEFAULT_CHAT_MODEL.to_string());
        let url = client.endpoint(DEFAULT_EMBEDDING_MODEL, "batchEmbedContents");

        let request = client.post(&url).build().unwrap();

        assert!(request.url().query().is_none());
        assert!(!request.url().as_str().contains("secret-key"));
        assert_eq!(request.headers()[API_KEY_HEADER], "secret-key");
    }

    #[tokio::test]
    async fn test_transport_failure_is_api_error_without_key() {
        let client = GeminiClient::new("secret-key".to_string(), DEFAULT_CHAT_MODEL.to_string())
            .with_base_url("http://127.0.0.1:1/models".to_string());

        let err = client.embed_many(&["lamp".to_string()]).await.unwrap_err();

        assert!(matches!(err.downcast_ref::<RagError>(), Some(RagError::Api(_))));
        assert!(!err.to_string().contains("secret-key"));
    }
}
