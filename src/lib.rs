pub mod catalog;
pub mod chat_client;
pub mod config;
pub mod embedding;
pub mod error;
pub mod gemini;
pub mod logging;
pub mod mock_llm;
pub mod openai;
pub mod query;
pub mod server;
pub mod state;
pub mod vector_index;

// Re-export commonly used types
pub use catalog::{Catalog, Document, Product};
pub use chat_client::{AnyChatClient, ChatClient, ChatMessage, GenerationOutput, Role};
pub use config::{Config, Provider};
pub use embedding::{AnyEmbedder, Embedder};
pub use error::RagError;
pub use mock_llm::{MockEmbedder, MockLLMClient};
pub use query::{MatchedProduct, QueryService, SearchFailure, SearchOutcome};
pub use state::AppState;
pub use vector_index::{SearchHit, VectorIndex, VectorStore};
