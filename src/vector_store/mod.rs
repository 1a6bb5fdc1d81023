//! Vector store abstraction for uploaded document chunks.
//!
//! Provides a trait-based interface for different vector database backends.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::chunking::ContentChunk;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chunk stored in the vector database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document ID.
    pub id: Uuid,
    /// File name the chunk was loaded from.
    pub source: String,
    /// Page, row or sheet within the source.
    pub location: Option<String>,
    /// Text content of this chunk.
    pub content: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// Order of this chunk within its source.
    pub chunk_order: i32,
    /// When this document was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl Document {
    /// Create a new document from a chunk and its embedding.
    pub fn new(chunk: ContentChunk, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: chunk.source,
            location: chunk.location,
            content: chunk.content,
            embedding,
            chunk_order: chunk.order,
            indexed_at: Utc::now(),
        }
    }

    /// Source and location for display, e.g. `report.pdf (page 3)`.
    pub fn citation(&self) -> String {
        match &self.location {
            Some(location) => format!("{} ({})", self.source, location),
            None => self.source.clone(),
        }
    }
}

/// A search result with score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The matched document.
    pub document: Document,
    /// Similarity score (higher is better).
    pub score: f32,
}

/// Summary information about an indexed file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedSource {
    /// File name.
    pub source: String,
    /// Number of indexed chunks.
    pub chunk_count: u32,
    /// When the file was indexed.
    pub indexed_at: DateTime<Utc>,
}

/// Trait for vector store implementations.
///
/// Searches return results ordered by descending score. Equal scores keep
/// insertion order.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Bulk upsert documents.
    async fn upsert_batch(&self, docs: &[Document]) -> Result<usize>;

    /// Search for similar documents.
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        self.search_with_threshold(query_embedding, limit, f32::MIN).await
    }

    /// Search with a minimum similarity threshold.
    async fn search_with_threshold(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>>;

    /// Delete all chunks of a file.
    async fn delete_by_source(&self, source: &str) -> Result<usize>;

    /// List all indexed files, most recent first.
    async fn list_sources(&self) -> Result<Vec<IndexedSource>>;

    /// Get total document count.
    async fn document_count(&self) -> Result<usize>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Score, filter and rank documents. The sort is stable.
pub(crate) fn rank(
    docs: impl IntoIterator<Item = Document>,
    query_embedding: &[f32],
    limit: usize,
    min_score: f32,
) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = docs
        .into_iter()
        .map(|document| {
            let score = cosine_similarity(query_embedding, &document.embedding);
            SearchResult { document, score }
        })
        .filter(|r| r.score >= min_score)
        .collect();

    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(limit);
    results
}

#[cfg(test)]
pub(crate) fn test_document(source: &str, content: &str, embedding: Vec<f32>, order: i32) -> Document {
    Document::new(
        ContentChunk {
            source: source.to_string(),
            location: None,
            content: content.to_string(),
            order,
        },
        embedding,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_degenerate() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_rank_keeps_insertion_order_on_ties() {
        let docs = vec![
            test_document("a.txt", "first", vec![1.0, 0.0], 0),
            test_document("a.txt", "second", vec![2.0, 0.0], 1),
            test_document("a.txt", "other", vec![0.0, 1.0], 2),
        ];

        let results = rank(docs, &[1.0, 0.0], 2, f32::MIN);
        let contents: Vec<&str> = results.iter().map(|r| r.document.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
    }

    #[test]
    fn test_citation() {
        let mut doc = test_document("report.pdf", "x", vec![], 0);
        assert_eq!(doc.citation(), "report.pdf");
        doc.location = Some("page 3".to_string());
        assert_eq!(doc.citation(), "report.pdf (page 3)");
    }
}
