//! In-memory vector index with cosine-similarity search.

use super::{RetrievalError, ScoredDocument};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Flat list of embedded documents. Search is an exact scan, which is
/// the right trade-off for the corpus sizes this serves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorIndex {
    documents: Vec<IndexedDocument>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, text: impl Into<String>, embedding: Vec<f32>) {
        self.documents.push(IndexedDocument {
            text: text.into(),
            embedding,
        });
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// The k documents most similar to the query vector, highest score
    /// first.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredDocument> {
        let mut scored: Vec<ScoredDocument> = self
            .documents
            .iter()
            .map(|doc| ScoredDocument {
                text: doc.text.clone(),
                score: cosine_similarity(query, &doc.embedding),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(k);
        scored
    }

    /// Load a prebuilt index from a JSON file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, RetrievalError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .await
            .map_err(|e| RetrievalError::Index(format!("read {:?}: {}", path, e)))?;

        let index: VectorIndex = serde_json::from_str(&json)
            .map_err(|e| RetrievalError::Index(format!("parse {:?}: {}", path, e)))?;

        tracing::info!("[VectorIndex] Loaded {} documents from {:?}", index.len(), path);
        Ok(index)
    }

    /// Write the index to a JSON file.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), RetrievalError> {
        let path = path.as_ref();
        let json = serde_json::to_string(self)
            .map_err(|e| RetrievalError::Index(e.to_string()))?;

        fs::write(path, json)
            .await
            .map_err(|e| RetrievalError::Index(format!("write {:?}: {}", path, e)))?;

        tracing::info!("[VectorIndex] Saved {} documents to {:?}", self.len(), path);
        Ok(())
    }
}

/// Split raw text into indexable chunks on blank lines.
pub fn split_chunks(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .map(str::to_string)
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_search_orders_by_score_descending() {
        let mut index = VectorIndex::new();
        index.add("far", vec![0.0, 1.0]);
        index.add("near", vec![1.0, 0.1]);
        index.add("exact", vec![1.0, 0.0]);

        let results = index.search(&[1.0, 0.0], 3);
        assert_eq!(results[0].text, "exact");
        assert_eq!(results[1].text, "near");
        assert_eq!(results[2].text, "far");
    }

    #[test]
    fn test_search_truncates_to_k() {
        let mut index = VectorIndex::new();
        index.add("a", vec![1.0]);
        index.add("b", vec![0.5]);
        index.add("c", vec![0.1]);

        assert_eq!(index.search(&[1.0], 2).len(), 2);
        // Asking for more than the corpus has returns everything.
        assert_eq!(index.search(&[1.0], 10).len(), 3);
    }

    #[tokio::test]
    async fn test_save_and_load_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index.json");

        let mut index = VectorIndex::new();
        index.add("doc one", vec![0.1, 0.2]);
        index.add("doc two", vec![0.3, 0.4]);
        index.save(&path).await.unwrap();

        let loaded = VectorIndex::load(&path).await.unwrap();
        assert_eq!(loaded.len(), 2);
        let results = loaded.search(&[0.3, 0.4], 1);
        assert_eq!(results[0].text, "doc two");
    }

    #[test]
    fn test_split_chunks() {
        let text = "first paragraph\nstill first\n\nsecond paragraph\n\n\n  \n\nthird";
        assert_eq!(
            split_chunks(text),
            vec![
                "first paragraph\nstill first",
                "second paragraph",
                "third"
            ]
        );
    }

    #[tokio::test]
    async fn test_load_missing_file_is_an_error() {
        let err = VectorIndex::load("/definitely/not/here.json").await.unwrap_err();
        assert!(matches!(err, RetrievalError::Index(_)));
    }
}
