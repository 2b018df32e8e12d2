use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::chat_client::{ChatMessage, GenerationOutput};
use crate::error::RagError;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Client for any OpenAI-compatible chat and embeddings API.
#[derive(Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    model: String,
    embedding_model: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAIClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_embedding_model(mut self, embedding_model: String) -> Self {
        self.embedding_model = embedding_model;
        self
    }

    pub async fn generate(&self, messages: &[ChatMessage]) -> Result<GenerationOutput> {
        let url = format!("{}/chat/completions", self.base_url);

        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: Some(0.7),
            max_tokens: Some(2048),
            stream: Some(false),
        };
        tracing::debug!(model = %self.model, messages = messages.len(), "OpenAI chat completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(RagError::transport)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RagError::status(status, &error_text).into());
        }

        let raw: serde_json::Value = response.json().await.map_err(RagError::transport)?;
        Ok(Self::parse_generation(raw))
    }

    fn parse_generation(raw: serde_json::Value) -> GenerationOutput {
        // The message object keeps its shape; text extraction happens downstream
        match serde_json::from_value::<ChatCompletionResponse>(raw.clone()) {
            Ok(api_response) => match api_response.choices.into_iter().next() {
                Some(choice) => GenerationOutput::Structured(choice.message),
                None => GenerationOutput::Structured(raw),
            },
            Err(_) => GenerationOutput::Structured(raw),
        }
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);

        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: texts,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(RagError::transport)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RagError::status(status, &error_text).into());
        }

        let api_response: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Invalid embedding response format: {}", e.without_url()))?;

        Self::order_embeddings(api_response, texts.len())
    }

    fn order_embeddings(api_response: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
        if api_response.data.len() != expected {
            return Err(anyhow!(
                "Expected {} embeddings, got {}",
                expected,
                api_response.data.len()
            ));
        }

        let mut data = api_response.data;
        data.sort_by_key(|d| d.index);
        if data.iter().enumerate().any(|(i, d)| d.index != i) {
            return Err(anyhow!("Embedding response indices are not contiguous"));
        }

        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl crate::chat_client::ChatClient for OpenAIClient {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<GenerationOutput> {
        self.generate(messages).await
    }

    fn client_name(&self) -> &str {
        "OpenAI"
    }
}

#[async_trait]
impl crate::embedding::Embedder for OpenAIClient {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed_many(texts).await
    }

    fn embedder_name(&self) -> &str {
        "OpenAI"
    }
}
