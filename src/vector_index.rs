use std::sync::Arc;

use tokio::sync::RwLock;

use crate::catalog::{Document, Product};
use crate::embedding::Embedder;
use crate::error::RagError;

/// A stored document and its embedding.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub document: Document,
    pub embedding: Vec<f32>,
}

/// Similarity score with document reference
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub document: Document,
    pub score: f32,
}

/// In-memory vector store. Built whole, then only read.
#[derive(Debug)]
pub struct VectorStore {
    documents: Vec<IndexedDocument>,
    dimension: usize,
}

impl VectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            documents: Vec::new(),
            dimension,
        }
    }

    pub fn add_document(&mut self, document: Document, embedding: Vec<f32>) -> Result<(), RagError> {
        if embedding.len() != self.dimension {
            return Err(RagError::Embedding(format!(
                "Expected embedding dimension {}, got {}",
                self.dimension,
                embedding.len()
            )));
        }
        self.documents.push(IndexedDocument { document, embedding });
        Ok(())
    }

    /// Top `k` documents by cosine similarity. Ties keep insertion order.
    pub fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<SearchHit>, RagError> {
        if query_embedding.len() != self.dimension {
            return Err(RagError::Embedding(format!(
                "Query embedding dimension {} doesn't match store dimension {}",
                query_embedding.len(),
                self.dimension
            )));
        }

        let mut hits: Vec<SearchHit> = self
            .documents
            .iter()
            .map(|doc| SearchHit {
                document: doc.document.clone(),
                score: cosine_similarity(query_embedding, &doc.embedding),
            })
            .collect();

        // sort_by is stable, which is what keeps ties in catalog order
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn documents(&self) -> &[IndexedDocument] {
        &self.documents
    }
}

/// Embeds the catalog and answers similarity queries against it.
///
/// The current store lives behind a single lock; "ready" means a store is
/// present. `initialize` swaps in a complete store in one assignment, so a
/// reader sees either the old index or the new one.
pub struct VectorIndex {
    embedder: Arc<dyn Embedder>,
    store: RwLock<Option<Arc<VectorStore>>>,
}

impl VectorIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            store: RwLock::new(None),
        }
    }

    /// Rebuilds the index from `products`. The previous index survives any failure.
    pub async fn initialize(&self, products: &[Product]) -> Result<usize, RagError> {
        if products.is_empty() {
            return Err(RagError::Initialization("no products to index".to_string()));
        }

        let documents: Vec<Document> = products.iter().map(Product::to_document).collect();
        let contents: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();

        tracing::info!(
            documents = documents.len(),
            embedder = self.embedder.embedder_name(),
            "Embedding catalog"
        );

        let embeddings = self
            .embedder
            .embed_batch(&contents)
            .await
            .map_err(|e| RagError::Initialization(e.to_string()))?;

        let store = build_store(documents, embeddings)?;
        let count = store.len();

        *self.store.write().await = Some(Arc::new(store));
        Ok(count)
    }

    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, RagError> {
        // Snapshot the store so the provider call runs without holding the lock
        let store = self.snapshot().await.ok_or(RagError::NotReady)?;
        if store.is_empty() {
            return Err(RagError::NotReady);
        }

        let query_embedding = self.embedder.embed(query).await.map_err(RagError::embedding)?;
        store.search(&query_embedding, k)
    }

    pub async fn snapshot(&self) -> Option<Arc<VectorStore>> {
        self.store.read().await.clone()
    }

    pub async fn is_ready(&self) -> bool {
        self.snapshot().await.map(|s| !s.is_empty()).unwrap_or(false)
    }

    pub async fn document_count(&self) -> usize {
        self.snapshot().await.map(|s| s.len()).unwrap_or(0)
    }

    pub fn embedder_name(&self) -> &str {
        self.embedder.embedder_name()
    }
}

fn build_store(documents: Vec<Document>, embeddings: Vec<Vec<f32>>) -> Result<VectorStore, RagError> {
    if embeddings.len() != documents.len() {
        return Err(RagError::Initialization(format!(
            "expected {} embeddings, got {}",
            documents.len(),
            embeddings.len()
        )));
    }

    let dimension = embeddings.first().map(Vec::len).unwrap_or(0);
    if dimension == 0 {
        return Err(RagError::Initialization("embedding provider returned empty vectors".to_string()));
    }

    let mut store = VectorStore::new(dimension);
    for (document, embedding) in documents.into_iter().zip(embeddings) {
        store
            .add_document(document, embedding)
            .map_err(|e| RagError::Initialization(e.to_string()))?;
    }
    Ok(store)
}

/// Cosine similarity of two vectors. Zero-length or non-finite input scores 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    // Collapse -0.0 too, so total_cmp ties every zero score
    let score = dot_product / (norm_a * norm_b);
    if score.is_finite() && score != 0.0 {
        score
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::mock_llm::MockEmbedder;

    fn product(id: u64, name: &str, description: &str) -> Product {
        Product {
            id,
            name: name.to_string(),
            description: description.to_string(),
            category: "General".to_string(),
            price: 10.0,
        }
    }

    fn index_with(embedder: MockEmbedder) -> VectorIndex {
        VectorIndex::new(Arc::new(embedder))
    }

    #[test]
    fn test_cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 2.0], &[1.0, 2.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_non_finite_vectors_score_zero() {
        assert_eq!(cosine_similarity(&[f32::NAN, 1.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[f32::INFINITY, 0.0], &[1.0, 0.0]), 0.0);

        let mut store = VectorStore::new(2);
        store
            .add_document(product(1, "Broken", "b").to_document(), vec![f32::NAN, 1.0])
            .unwrap();
        store
            .add_document(product(2, "Good", "g").to_document(), vec![1.0, 0.0])
            .unwrap();
        store
            .add_document(product(3, "Opposite", "o").to_document(), vec![-1.0, 0.0])
            .unwrap();

        let hits = store.search(&[1.0, 0.0], 3).unwrap();
        let ids: Vec<u64> = hits.iter().map(|h| h.document.metadata.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
        assert!(hits.iter().all(|h| h.score.is_finite()));
    }

    #[test]
    fn test_store_rejects_dimension_mismatch() {
        let mut store = VectorStore::new(2);
        let doc = product(1, "A", "a").to_document();
        assert!(store.add_document(doc, vec![1.0, 2.0, 3.0]).is_err());
        assert!(store.search(&[1.0], 1).is_err());
    }

    #[test]
    fn test_store_ties_keep_insertion_order() {
        let mut store = VectorStore::new(2);
        for id in 1..=4 {
            store
                .add_document(product(id, "P", "p").to_document(), vec![1.0, 0.0])
                .unwrap();
        }

        let hits = store.search(&[1.0, 0.0], 3).unwrap();
        let ids: Vec<u64> = hits.iter().map(|h| h.document.metadata.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_search_before_initialize_is_not_ready() {
        let index = index_with(MockEmbedder::new());
        assert!(!index.is_ready().await);
        assert!(matches!(index.search("anything", 3).await, Err(RagError::NotReady)));
    }

    #[tokio::test]
    async fn test_initialize_indexes_every_product() {
        let catalog = Catalog::builtin().unwrap();
        let index = index_with(MockEmbedder::new());

        let count = index.initialize(catalog.products()).await.unwrap();

        assert_eq!(count, catalog.len());
        assert_eq!(index.document_count().await, catalog.len());
        assert!(index.is_ready().await);
    }

    #[tokio::test]
    async fn test_search_returns_at_most_k_in_descending_order() {
        let catalog = Catalog::builtin().unwrap();
        let index = index_with(MockEmbedder::new());
        index.initialize(catalog.products()).await.unwrap();

        for k in [0, 1, 3, 100] {
            let hits = index.search("wireless headphones", k).await.unwrap();
            assert!(hits.len() <= k);
            assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
            assert!(hits
                .iter()
                .all(|h| catalog.get(h.document.metadata.id) == Some(&h.document.metadata)));
        }

        let top = index.search("wireless headphones", 1).await.unwrap();
        assert!(top[0].document.metadata.name.contains("Headphones"));
    }

    #[tokio::test]
    async fn test_empty_query_does_not_fail() {
        let catalog = Catalog::builtin().unwrap();
        let index = index_with(MockEmbedder::new());
        index.initialize(catalog.products()).await.unwrap();

        let hits = index.search("", 3).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|h| h.score == 0.0));
    }

    #[tokio::test]
    async fn test_reinitialize_replaces_previous_catalog() {
        let index = index_with(MockEmbedder::new());
        let first = vec![product(1, "Lamp", "desk lamp"), product(2, "Rug", "wool rug")];
        let second = vec![product(3, "Kettle", "electric kettle")];

        index.initialize(&first).await.unwrap();
        index.initialize(&second).await.unwrap();

        let store = index.snapshot().await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.documents()[0].document.metadata.id, 3);
    }

    #[tokio::test]
    async fn test_failed_initialize_keeps_previous_index() {
        // First batch succeeds, the rebuild fails
        let index = index_with(MockEmbedder::new().fail_after(1));
        let products = vec![product(1, "Lamp", "desk lamp"), product(2, "Rug", "wool rug")];

        index.initialize(&products).await.unwrap();
        let result = index.initialize(&products[..1]).await;

        assert!(matches!(result, Err(RagError::Initialization(_))));
        assert_eq!(index.document_count().await, 2);
    }

    #[tokio::test]
    async fn test_partial_batch_fails_initialization() {
        let index = index_with(MockEmbedder::new().dropping_last());
        let products = vec![product(1, "Lamp", "desk lamp"), product(2, "Rug", "wool rug")];

        let result = index.initialize(&products).await;

        assert!(matches!(result, Err(RagError::Initialization(_))));
        assert!(!index.is_ready().await);
    }

    #[tokio::test]
    async fn test_zero_dimension_embeddings_rejected() {
        let index = index_with(MockEmbedder::with_dimension(0));
        let result = index.initialize(&[product(1, "Lamp", "desk lamp")]).await;
        assert!(matches!(result, Err(RagError::Initialization(_))));
    }

    #[tokio::test]
    async fn test_initialize_without_products_fails() {
        let index = index_with(MockEmbedder::new());
        assert!(matches!(index.initialize(&[]).await, Err(RagError::Initialization(_))));
    }

    #[tokio::test]
    async fn test_query_embedding_failure_is_embedding_error() {
        let index = index_with(MockEmbedder::new().fail_after(1));
        index.initialize(&[product(1, "Lamp", "desk lamp")]).await.unwrap();

        assert!(matches!(index.search("lamp", 3).await, Err(RagError::Embedding(_))));
    }
}
