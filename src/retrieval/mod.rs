//! Context Retrieval
//!
//! Information Hiding:
//! - Vector index layout and similarity metric hidden behind [`Retriever`]
//! - Embedding provider reachable only through the embedding seam

use crate::core::embedding::{EmbeddingError, EmbeddingService};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub mod index;

pub use index::VectorIndex;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("query embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector index unavailable: {0}")]
    Index(String),
}

/// One retrieved context document with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub text: String,
    pub score: f32,
}

/// Fetches the documents most relevant to a query, best first.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn top_k(&self, query: &str, k: usize) -> Result<Vec<ScoredDocument>, RetrievalError>;
}

/// Retriever over an in-memory vector index: embed the query, then
/// nearest-neighbor search. Consumers take the result order as-is.
pub struct EmbeddingRetriever {
    index: VectorIndex,
    embedder: Arc<dyn EmbeddingService>,
}

impl EmbeddingRetriever {
    pub fn new(index: VectorIndex, embedder: Arc<dyn EmbeddingService>) -> Self {
        Self { index, embedder }
    }
}

#[async_trait]
impl Retriever for EmbeddingRetriever {
    async fn top_k(&self, query: &str, k: usize) -> Result<Vec<ScoredDocument>, RetrievalError> {
        if self.index.is_empty() {
            tracing::debug!("[EmbeddingRetriever] Index is empty, returning no context");
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query).await?;
        let results = self.index.search(&query_vector, k);
        tracing::debug!(
            "[EmbeddingRetriever] Retrieved {} documents for query ({} chars)",
            results.len(),
            query.len()
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UnitEmbedder;

    #[async_trait]
    impl EmbeddingService for UnitEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            // Axis-aligned vectors keyed on the first word.
            Ok(match text.split_whitespace().next() {
                Some("alpha") => vec![1.0, 0.0],
                Some("beta") => vec![0.0, 1.0],
                _ => vec![0.7, 0.7],
            })
        }
    }

    fn sample_index() -> VectorIndex {
        let mut index = VectorIndex::new();
        index.add("alpha doc", vec![1.0, 0.0]);
        index.add("beta doc", vec![0.0, 1.0]);
        index
    }

    #[tokio::test]
    async fn test_top_k_ranks_by_similarity() {
        let retriever = EmbeddingRetriever::new(sample_index(), Arc::new(UnitEmbedder));

        let results = retriever.top_k("alpha question", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "alpha doc");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn test_empty_index_returns_no_documents() {
        let retriever = EmbeddingRetriever::new(VectorIndex::new(), Arc::new(UnitEmbedder));
        let results = retriever.top_k("anything", 4).await.unwrap();
        assert!(results.is_empty());
    }
}
