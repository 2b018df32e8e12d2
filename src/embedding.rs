use anyhow::{anyhow, Result};
use async_trait::async_trait;

/// Contract for a hosted (or mocked) text embedding model.
///
/// Catalog documents and queries must go through the same embedder so that
/// their vectors are comparable.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Embedding provider returned no vector"))
    }

    /// Name of the embedding backend (for logging purposes)
    fn embedder_name(&self) -> &str;
}

/// Wrapper enum that implements Embedder for the supported providers
pub enum AnyEmbedder {
    Gemini(crate::gemini::GeminiClient),
    OpenAI(crate::openai::OpenAIClient),
    Mock(crate::mock_llm::MockEmbedder),
}

#[async_trait]
impl Embedder for AnyEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        match self {
            AnyEmbedder::Gemini(client) => client.embed_batch(texts).await,
            AnyEmbedder::OpenAI(client) => client.embed_batch(texts).await,
            AnyEmbedder::Mock(embedder) => embedder.embed_batch(texts).await,
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        match self {
            AnyEmbedder::Gemini(client) => client.embed(text).await,
            AnyEmbedder::OpenAI(client) => client.embed(text).await,
            AnyEmbedder::Mock(embedder) => embedder.embed(text).await,
        }
    }

    fn embedder_name(&self) -> &str {
        match self {
            AnyEmbedder::Gemini(_) => "Gemini",
            AnyEmbedder::OpenAI(_) => "OpenAI",
            AnyEmbedder::Mock(_) => "MockEmbedder",
        }
    }
}
