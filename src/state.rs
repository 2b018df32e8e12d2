use std::path::PathBuf;
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::chat_client::{AnyChatClient, ChatClient};
use crate::config::{Config, Provider};
use crate::embedding::{AnyEmbedder, Embedder};
use crate::error::RagError;
use crate::gemini::GeminiClient;
use crate::mock_llm::{MockEmbedder, MockLLMClient};
use crate::openai::OpenAIClient;
use crate::query::QueryService;
use crate::vector_index::VectorIndex;

/// Application state shared across all routes.
///
/// Holds the loaded catalog and the query service, which owns the vector
/// index. Providers are injected, so tests can pass fakes.
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub queries: QueryService,
    pub static_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(catalog: Catalog, embedder: Arc<dyn Embedder>, chat: Arc<dyn ChatClient>) -> Self {
        let index = Arc::new(VectorIndex::new(embedder));
        Self {
            catalog: Arc::new(catalog),
            queries: QueryService::new(index, chat),
            static_dir: None,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.queries = self.queries.with_top_k(top_k);
        self
    }

    pub fn with_static_dir(mut self, static_dir: PathBuf) -> Self {
        self.static_dir = Some(static_dir);
        self
    }

    /// Loads the catalog and wires up the configured providers.
    pub fn from_config(config: &Config) -> Result<Self, RagError> {
        let catalog = Catalog::load(config.catalog_path.as_deref())?;
        let (embedder, chat) = build_providers(config)?;

        let mut state = Self::new(catalog, embedder, chat).with_top_k(config.top_k);
        if config.static_dir.is_dir() {
            state = state.with_static_dir(config.static_dir.clone());
        }
        Ok(state)
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        self.queries.index()
    }
}

pub fn build_providers(
    config: &Config,
) -> Result<(Arc<dyn Embedder>, Arc<dyn ChatClient>), RagError> {
    match config.provider {
        Provider::Gemini => {
            let api_key = config
                .gemini_api_key
                .clone()
                .ok_or_else(|| RagError::Config("GEMINI_API_KEY is not set".to_string()))?;
            let chat_model = config
                .chat_model
                .clone()
                .unwrap_or_else(|| crate::gemini::DEFAULT_CHAT_MODEL.to_string());
            let embedding_model = config
                .embedding_model
                .clone()
                .unwrap_or_else(|| crate::gemini::DEFAULT_EMBEDDING_MODEL.to_string());

            let client = GeminiClient::new(api_key, chat_model).with_embedding_model(embedding_model);
            let embedder: Arc<dyn Embedder> = Arc::new(AnyEmbedder::Gemini(client.clone()));
            let chat: Arc<dyn ChatClient> = Arc::new(AnyChatClient::Gemini(client));
            Ok((embedder, chat))
        }
        Provider::OpenAI => {
            let api_key = config
                .openai_api_key
                .clone()
                .ok_or_else(|| RagError::Config("OPENAI_API_KEY is not set".to_string()))?;
            let chat_model = config
                .chat_model
                .clone()
                .unwrap_or_else(|| crate::openai::DEFAULT_CHAT_MODEL.to_string());
            let embedding_model = config
                .embedding_model
                .clone()
                .unwrap_or_else(|| crate::openai::DEFAULT_EMBEDDING_MODEL.to_string());

            let client = OpenAIClient::new(api_key, chat_model)
                .with_base_url(config.openai_base_url.clone())
                .with_embedding_model(embedding_model);
            let embedder: Arc<dyn Embedder> = Arc::new(AnyEmbedder::OpenAI(client.clone()));
            let chat: Arc<dyn ChatClient> = Arc::new(AnyChatClient::OpenAI(client));
            Ok((embedder, chat))
        }
        Provider::Mock => {
            let embedder: Arc<dyn Embedder> = Arc::new(AnyEmbedder::Mock(MockEmbedder::new()));
            let chat: Arc<dyn ChatClient> = Arc::new(AnyChatClient::Mock(MockLLMClient::new()));
            Ok((embedder, chat))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_config_builds_state() {
        let config = Config::from_sources(None, |key| match key {
            "RAG_PROVIDER" => Some("mock".to_string()),
            "RAG_TOP_K" => Some("2".to_string()),
            "RAG_STATIC_DIR" => Some("/nonexistent/static".to_string()),
            _ => None,
        })
        .unwrap();

        let state = AppState::from_config(&config).unwrap();
        assert!(!state.catalog.is_empty());
        assert!(state.static_dir.is_none());
        assert_eq!(state.index().embedder_name(), "MockEmbedder");
    }

    #[test]
    fn test_missing_catalog_file_fails() {
        let config = Config {
            provider: Provider::Mock,
            catalog_path: Some(PathBuf::from("/nonexistent/products.json")),
            ..Config::default()
        };
        assert!(matches!(AppState::from_config(&config), Err(RagError::Catalog(_))));
    }
}
