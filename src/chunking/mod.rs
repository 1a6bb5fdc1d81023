//! Content chunking for breaking loaded documents into searchable pieces.

mod recursive;

pub use recursive::RecursiveChunker;

use crate::config::ChunkingSettings;
use crate::error::{ParleyError, Result};
use crate::loader::LoadedDocument;
use serde::{Deserialize, Serialize};

/// A chunk of text from a loaded document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentChunk {
    /// File the chunk came from.
    pub source: String,
    /// Page, row or sheet within the file.
    pub location: Option<String>,
    /// Text content of this chunk.
    pub content: String,
    /// Order of this chunk within its source file.
    pub order: i32,
}

/// Configuration for chunking.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters of trailing context repeated at the start of the next chunk.
    pub chunk_overlap: usize,
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(ParleyError::Chunking(format!(
                "overlap ({}) must be smaller than a non-zero chunk size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
        }
    }
}

impl TryFrom<&ChunkingSettings> for ChunkingConfig {
    type Error = ParleyError;

    fn try_from(settings: &ChunkingSettings) -> Result<Self> {
        Self::new(settings.chunk_size, settings.chunk_overlap)
    }
}

/// Trait for content chunking implementations.
pub trait Chunker: Send + Sync {
    /// Split raw text into chunk strings.
    fn split_text(&self, text: &str) -> Vec<String>;

    /// Split every document, numbering chunks per source file.
    fn chunk_documents(&self, documents: &[LoadedDocument]) -> Vec<ContentChunk> {
        let mut chunks = Vec::new();
        let mut order_by_source: std::collections::HashMap<&str, i32> = std::collections::HashMap::new();

        for document in documents {
            for content in self.split_text(&document.content) {
                let order = order_by_source.entry(document.source.as_str()).or_insert(0);
                chunks.push(ContentChunk {
                    source: document.source.clone(),
                    location: document.location.clone(),
                    content,
                    order: *order,
                });
                *order += 1;
            }
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(ChunkingConfig::new(500, 100).is_ok());
        assert!(ChunkingConfig::new(100, 100).is_err());
        assert!(ChunkingConfig::new(0, 0).is_err());
    }

    #[test]
    fn test_chunk_order_is_per_source() {
        let chunker = RecursiveChunker::new(ChunkingConfig::new(10, 0).unwrap());
        let documents = vec![
            LoadedDocument::new("a.pdf", Some("page 1".to_string()), "alpha beta gamma"),
            LoadedDocument::new("a.pdf", Some("page 2".to_string()), "delta"),
            LoadedDocument::new("b.txt", None, "epsilon"),
        ];

        let chunks = chunker.chunk_documents(&documents);
        let orders: Vec<(&str, i32)> = chunks.iter().map(|c| (c.source.as_str(), c.order)).collect();
        assert_eq!(orders, vec![("a.pdf", 0), ("a.pdf", 1), ("a.pdf", 2), ("b.txt", 0)]);
        assert_eq!(chunks[2].location.as_deref(), Some("page 2"));
    }
}
