//! RAG (Retrieval-Augmented Generation) for question answering over uploaded documents.

pub mod context;
mod generator;
mod response;

pub use context::ContextBuilder;
pub use generator::{GenerationRequest, Generator, OpenAIGenerator};
pub use response::{RagEngine, RagResponse, NO_CONTEXT_ANSWER};

#[cfg(test)]
pub(crate) use generator::testing;

use crate::vector_store::SearchResult;
use serde::Serialize;

/// A retrieved chunk used as context for an answer.
#[derive(Debug, Clone, Serialize)]
pub struct ContextChunk {
    /// File the chunk came from.
    pub source: String,
    /// Page, row or sheet within the file.
    pub location: Option<String>,
    /// Text content.
    pub content: String,
    /// Similarity score.
    pub score: f32,
}

impl ContextChunk {
    /// Source and location for display.
    pub fn citation(&self) -> String {
        match &self.location {
            Some(location) => format!("{} ({})", self.source, location),
            None => self.source.clone(),
        }
    }
}

impl From<SearchResult> for ContextChunk {
    fn from(result: SearchResult) -> Self {
        Self {
            source: result.document.source,
            location: result.document.location,
            content: result.document.content,
            score: result.score,
        }
    }
}
