use std::sync::Arc;

use serde::Serialize;

use crate::catalog::Product;
use crate::chat_client::{ChatClient, ChatMessage};
use crate::error::RagError;
use crate::vector_index::{SearchHit, VectorIndex};

pub const DEFAULT_TOP_K: usize = 3;

pub const GENERAL_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Answer the user's question clearly and concisely.";

/// Shown to the caller when a search could not be completed.
pub const SEARCH_FAILURE_MESSAGE: &str =
    "Sorry, something went wrong while processing your request. Please try again.";

/// System prompt for the retrieval branch, embedding one context line per matched product.
pub fn product_system_prompt(context: &str) -> String {
    format!(
        "You are a helpful product recommendation assistant. \
         Use the product information below to recommend the products that best match the user's request. \
         Mention product names and prices, and only recommend products from this list.\n\n\
         Available Products:\n{}",
        context
    )
}

/// Newline-joined context lines for the matched products, in rank order.
pub fn build_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| hit.document.metadata.context_line())
        .collect::<Vec<_>>()
        .join("\n")
}

/// A retrieved product as returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedProduct {
    #[serde(flatten)]
    pub product: Product,
    /// Cosine similarity between the query and this product's document.
    pub similarity: f32,
}

impl From<SearchHit> for MatchedProduct {
    fn from(hit: SearchHit) -> Self {
        Self {
            product: hit.document.metadata,
            similarity: hit.score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    pub products: Vec<MatchedProduct>,
    pub response: String,
    pub rag_ready: bool,
}

impl SearchOutcome {
    /// The safe body handed back when a search fails.
    pub fn degraded() -> Self {
        Self {
            products: Vec::new(),
            response: SEARCH_FAILURE_MESSAGE.to_string(),
            rag_ready: false,
        }
    }
}

/// A failed search: the cause plus the degraded outcome to report.
#[derive(Debug)]
pub struct SearchFailure {
    pub error: RagError,
    pub outcome: SearchOutcome,
}

impl SearchFailure {
    fn new(error: RagError) -> Self {
        Self {
            error,
            outcome: SearchOutcome::degraded(),
        }
    }
}

/// Orchestrates retrieval and generation for one query.
pub struct QueryService {
    index: Arc<VectorIndex>,
    chat: Arc<dyn ChatClient>,
    top_k: usize,
}

impl QueryService {
    pub fn new(index: Arc<VectorIndex>, chat: Arc<dyn ChatClient>) -> Self {
        Self {
            index,
            chat,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub async fn handle_search(&self, query: &str) -> Result<SearchOutcome, SearchFailure> {
        match self.run(query).await {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                tracing::error!(error = %error, "Search failed");
                Err(SearchFailure::new(error))
            }
        }
    }

    async fn run(&self, query: &str) -> Result<SearchOutcome, RagError> {
        let retrieved = if self.index.is_ready().await {
            match self.index.search(query, self.top_k).await {
                Ok(hits) => Some(hits),
                // The index can disappear between the check and the search
                Err(RagError::NotReady) => None,
                Err(e) => return Err(e),
            }
        } else {
            None
        };

        let rag_ready = retrieved.is_some();
        let (messages, products) = match retrieved {
            Some(hits) => {
                let context = build_context(&hits);
                let messages = vec![
                    ChatMessage::system(product_system_prompt(&context)),
                    ChatMessage::user(query),
                ];
                (messages, hits.into_iter().map(MatchedProduct::from).collect())
            }
            None => (
                vec![ChatMessage::system(GENERAL_SYSTEM_PROMPT), ChatMessage::user(query)],
                Vec::new(),
            ),
        };

        tracing::info!(
            rag_ready,
            matches = products.len(),
            client = self.chat.client_name(),
            "Generating response"
        );

        let output = self
            .chat
            .generate(&messages)
            .await
            .map_err(RagError::generation)?;

        Ok(SearchOutcome {
            products,
            response: output.into_text(),
            rag_ready,
        })
    }
}
