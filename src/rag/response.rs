//! RAG response generation.

use super::context::{format_context_for_display, format_context_for_prompt};
use super::{ContextBuilder, ContextChunk, GenerationRequest, Generator};
use crate::config::{Prompts, RagSettings};
use crate::embedding::Embedder;
use crate::error::{ParleyError, Result};
use crate::vector_store::VectorStore;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Answer returned when retrieval finds nothing to stuff into the prompt.
pub const NO_CONTEXT_ANSWER: &str =
    "I couldn't find any relevant information in the uploaded documents for this question.";

/// RAG engine for question answering.
pub struct RagEngine {
    generator: Arc<dyn Generator>,
    context_builder: ContextBuilder,
    prompts: Prompts,
    temperature: f32,
}

impl RagEngine {
    /// Create a new RAG engine.
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        settings: &RagSettings,
    ) -> Self {
        let context_builder = ContextBuilder::new(vector_store, embedder)
            .with_max_chunks(settings.max_context_chunks)
            .with_min_score(settings.min_score);

        Self {
            generator,
            context_builder,
            prompts: Prompts::default(),
            temperature: settings.temperature,
        }
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Ask a single question and get a response.
    #[instrument(skip(self), fields(question = %question))]
    pub async fn ask(&self, question: &str) -> Result<RagResponse> {
        let Some((request, sources)) = self.prepare(question).await? else {
            return Ok(RagResponse::without_context());
        };

        let answer = self.generator.generate(&request).await?;
        debug!("Generated response with {} sources", sources.len());

        Ok(RagResponse { answer, sources })
    }

    /// Ask a question, streaming answer tokens to `on_token` as they arrive.
    #[instrument(skip(self, on_token), fields(question = %question))]
    pub async fn ask_streaming(
        &self,
        question: &str,
        on_token: &mut (dyn for<'t> FnMut(&'t str) + Send),
    ) -> Result<RagResponse> {
        let Some((request, sources)) = self.prepare(question).await? else {
            on_token(NO_CONTEXT_ANSWER);
            return Ok(RagResponse::without_context());
        };

        let answer = self.generator.generate_stream(&request, on_token).await?;
        debug!("Streamed response with {} sources", sources.len());

        Ok(RagResponse { answer, sources })
    }

    /// Retrieve context and render the prompt. `None` when nothing was retrieved.
    async fn prepare(&self, question: &str) -> Result<Option<(GenerationRequest, Vec<ContextChunk>)>> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ParleyError::InvalidInput("question is empty".to_string()));
        }

        info!("Processing question: {}", question);

        let sources = self.context_builder.build(question).await?;
        if sources.is_empty() {
            return Ok(None);
        }

        let mut vars = HashMap::new();
        vars.insert("question".to_string(), question.to_string());
        vars.insert("context".to_string(), format_context_for_prompt(&sources));

        let request = GenerationRequest {
            system: self.prompts.render_with_custom(&self.prompts.rag.system, &vars),
            user: self.prompts.render_with_custom(&self.prompts.rag.user, &vars),
            temperature: self.temperature,
        };

        Ok(Some((request, sources)))
    }
}

/// A RAG response with answer and sources.
#[derive(Debug, Clone, Serialize)]
pub struct RagResponse {
    /// The generated answer.
    pub answer: String,
    /// Source chunks used for the answer.
    pub sources: Vec<ContextChunk>,
}

impl RagResponse {
    fn without_context() -> Self {
        Self {
            answer: NO_CONTEXT_ANSWER.to_string(),
            sources: Vec::new(),
        }
    }

    /// Format the response for display.
    pub fn format_for_display(&self) -> String {
        let mut output = self.answer.clone();

        if !self.sources.is_empty() {
            output.push_str("\n\n--- Sources ---\n");
            output.push_str(&format_context_for_display(&self.sources));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::testing::FakeEmbedder;
    use crate::rag::testing::FakeGenerator;
    use crate::vector_store::{test_document, MemoryVectorStore};

    async fn store_with(docs: Vec<crate::vector_store::Document>) -> Arc<MemoryVectorStore> {
        let store = Arc::new(MemoryVectorStore::new());
        store.upsert_batch(&docs).await.unwrap();
        store
    }

    fn settings() -> RagSettings {
        RagSettings {
            max_context_chunks: 2,
            ..RagSettings::default()
        }
    }

    #[tokio::test]
    async fn test_ask_stuffs_context_into_prompt() {
        let store = store_with(vec![
            test_document("faq.txt", "Refunds take five days.", vec![1.0, 0.0, 0.0], 0),
            test_document("faq.txt", "Shipping is free.", vec![0.8, 0.2, 0.0], 1),
            test_document("faq.txt", "Office hours are 9 to 5.", vec![0.0, 0.0, 1.0], 2),
        ])
        .await;
        let embedder = Arc::new(FakeEmbedder::new().with("How long do refunds take?", vec![1.0, 0.0, 0.0]));
        let generator = Arc::new(FakeGenerator::replying("Five days."));

        let engine = RagEngine::new(store, embedder, generator.clone(), &settings());
        let response = engine.ask("How long do refunds take?").await.unwrap();

        assert_eq!(response.answer, "Five days.");
        assert_eq!(response.sources.len(), 2);
        assert_eq!(response.sources[0].content, "Refunds take five days.");

        let request = generator.last_request().unwrap();
        assert!(request
            .user
            .contains("Refunds take five days.\n\nShipping is free."));
        assert!(request.user.contains("Question: How long do refunds take?"));
        assert!(!request.user.contains("Office hours"));
        assert_eq!(request.temperature, 0.0);
    }

    #[tokio::test]
    async fn test_empty_index_skips_model_call() {
        let store = store_with(Vec::new()).await;
        let generator = Arc::new(FakeGenerator::replying("unused"));

        let engine = RagEngine::new(store, Arc::new(FakeEmbedder::new()), generator.clone(), &settings());
        let response = engine.ask("anything?").await.unwrap();

        assert_eq!(response.answer, NO_CONTEXT_ANSWER);
        assert!(response.sources.is_empty());
        assert_eq!(generator.request_count(), 0);
    }

    #[tokio::test]
    async fn test_streaming_forwards_tokens() {
        let store = store_with(vec![test_document("a.txt", "alpha", vec![1.0], 0)]).await;
        let generator = Arc::new(FakeGenerator::replying("the answer is alpha"));
        let engine = RagEngine::new(store, Arc::new(FakeEmbedder::new()), generator, &settings());

        let mut tokens = Vec::new();
        let response = engine
            .ask_streaming("what?", &mut |token: &str| tokens.push(token.to_string()))
            .await
            .unwrap();

        assert_eq!(response.answer, "the answer is alpha");
        assert_eq!(tokens.concat(), "the answer is alpha");
        assert!(tokens.len() > 1);
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let store = store_with(Vec::new()).await;
        let engine = RagEngine::new(
            store,
            Arc::new(FakeEmbedder::new()),
            Arc::new(FakeGenerator::replying("")),
            &settings(),
        );
        assert!(matches!(engine.ask("   ").await, Err(ParleyError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_generator_failure_propagates() {
        let store = store_with(vec![test_document("a.txt", "alpha", vec![1.0], 0)]).await;
        let engine = RagEngine::new(
            store,
            Arc::new(FakeEmbedder::new()),
            Arc::new(FakeGenerator::failing()),
            &settings(),
        );
        let err = engine.ask("what?").await.unwrap_err();
        assert!(err.is_upstream());
    }

    #[test]
    fn test_format_for_display() {
        let response = RagResponse {
            answer: "Yes.".to_string(),
            sources: vec![ContextChunk {
                source: "a.txt".to_string(),
                location: None,
                content: "c".to_string(),
                score: 0.9,
            }],
        };
        assert_eq!(response.format_for_display(), "Yes.\n\n--- Sources ---\n[1] a.txt (score: 0.90)");
    }
}
