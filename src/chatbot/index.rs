//! Indexed question set and nearest-neighbour answer lookup.

use crate::chatlog::QaPair;
use crate::embedding::Embedder;
use crate::error::{ParleyError, Result};
use crate::vector_store::cosine_similarity;
use serde::Serialize;
use tracing::{debug, info, instrument};

/// A QA pair with the embedding of its question.
#[derive(Debug, Clone)]
pub struct IndexedQuestion {
    pub question: String,
    pub answer: String,
    pub embedding: Vec<f32>,
}

/// The best match for a user message.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedAnswer {
    pub answer: String,
    /// The stored question that matched.
    pub question: String,
    /// Cosine similarity between the message and the matched question.
    pub score: f32,
}

/// Embedded questions of one target speaker, in segmentation order.
#[derive(Debug, Clone, Default)]
pub struct QuestionIndex {
    entries: Vec<IndexedQuestion>,
}

impl QuestionIndex {
    /// Build from already-embedded entries.
    pub fn from_entries(entries: Vec<IndexedQuestion>) -> Self {
        Self { entries }
    }

    /// Embed every question. Fails with `EmptyCorpus` before calling the
    /// embedder when there is nothing to embed.
    pub async fn build(pairs: &[QaPair], embedder: &dyn Embedder, batch_size: usize) -> Result<Self> {
        Self::build_with_progress(pairs, embedder, batch_size, |_, _| {}).await
    }

    /// Like [`QuestionIndex::build`], calling `on_progress(done, total)` after each batch.
    #[instrument(skip_all, fields(pairs = pairs.len()))]
    pub async fn build_with_progress<F>(
        pairs: &[QaPair],
        embedder: &dyn Embedder,
        batch_size: usize,
        mut on_progress: F,
    ) -> Result<Self>
    where
        F: FnMut(usize, usize) + Send,
    {
        if pairs.is_empty() {
            return Err(ParleyError::EmptyCorpus(
                "the selected speaker has no question/answer pairs".to_string(),
            ));
        }

        let total = pairs.len();
        let mut entries = Vec::with_capacity(total);

        for batch in pairs.chunks(batch_size.max(1)) {
            let questions: Vec<String> = batch.iter().map(|p| p.question.clone()).collect();
            let embeddings = embedder.embed_batch(&questions).await?;

            if embeddings.len() != batch.len() {
                return Err(ParleyError::Embedding(format!(
                    "Expected {} embeddings, got {}",
                    batch.len(),
                    embeddings.len()
                )));
            }

            entries.extend(batch.iter().zip(embeddings).map(|(pair, embedding)| IndexedQuestion {
                question: pair.question.clone(),
                answer: pair.answer.clone(),
                embedding,
            }));

            on_progress(entries.len(), total);
        }

        info!("Indexed {} questions", entries.len());
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexedQuestion] {
        &self.entries
    }

    /// Entry whose question is most similar to `query_embedding`.
    ///
    /// Ties go to the earliest entry.
    pub fn nearest(&self, query_embedding: &[f32]) -> Result<(&IndexedQuestion, f32)> {
        let mut best: Option<(&IndexedQuestion, f32)> = None;

        for entry in &self.entries {
            let score = cosine_similarity(query_embedding, &entry.embedding);
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((entry, score)),
            }
        }

        best.ok_or_else(|| ParleyError::EmptyCorpus("no indexed questions to search".to_string()))
    }

    /// Embed `message` and return the answer of the closest question.
    #[instrument(skip(self, embedder))]
    pub async fn answer(&self, message: &str, embedder: &dyn Embedder) -> Result<RetrievedAnswer> {
        if self.entries.is_empty() {
            return Err(ParleyError::EmptyCorpus(
                "no indexed questions to search".to_string(),
            ));
        }

        let query_embedding = embedder.embed(message).await?;
        let (entry, score) = self.nearest(&query_embedding)?;
        debug!("Best match (score {:.3}): {}", score, entry.question);

        Ok(RetrievedAnswer {
            answer: entry.answer.clone(),
            question: entry.question.clone(),
            score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::testing::FakeEmbedder;

    fn entry(question: &str, answer: &str, embedding: Vec<f32>) -> IndexedQuestion {
        IndexedQuestion {
            question: question.to_string(),
            answer: answer.to_string(),
            embedding,
        }
    }

    #[tokio::test]
    async fn test_returns_answer_of_closest_question() {
        let index = QuestionIndex::from_entries(vec![
            entry("How are you?", "Good", vec![1.0, 0.0]),
            entry("What's up?", "Nothing much", vec![0.0, 1.0]),
        ]);
        let embedder = FakeEmbedder::new().with("sup", vec![0.1, 0.9]);

        let retrieved = index.answer("sup", &embedder).await.unwrap();
        assert_eq!(retrieved.answer, "Nothing much");
        assert_eq!(retrieved.question, "What's up?");
    }

    #[test]
    fn test_ties_go_to_first_entry() {
        let index = QuestionIndex::from_entries(vec![
            entry("q1", "first", vec![1.0, 0.0]),
            entry("q2", "second", vec![1.0, 0.0]),
        ]);
        let (best, score) = index.nearest(&[2.0, 0.0]).unwrap();
        assert_eq!(best.answer, "first");
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_negative_similarities_still_pick_maximum() {
        let index = QuestionIndex::from_entries(vec![
            entry("q1", "far", vec![-1.0, 0.0]),
            entry("q2", "less far", vec![-1.0, 1.0]),
        ]);
        let (best, _) = index.nearest(&[1.0, 0.0]).unwrap();
        assert_eq!(best.answer, "less far");
    }

    #[tokio::test]
    async fn test_empty_index_fails_fast_without_embedding() {
        let index = QuestionIndex::default();
        let embedder = FakeEmbedder::new();

        let err = index.answer("hello", &embedder).await.unwrap_err();
        assert!(matches!(err, ParleyError::EmptyCorpus(_)));
        assert_eq!(embedder.call_count(), 0);
    }

    #[tokio::test]
    async fn test_build_rejects_empty_pairs() {
        let embedder = FakeEmbedder::new();
        let err = QuestionIndex::build(&[], &embedder, 10).await.unwrap_err();
        assert!(matches!(err, ParleyError::EmptyCorpus(_)));
        assert_eq!(embedder.call_count(), 0);
    }

    #[tokio::test]
    async fn test_build_batches_and_reports_progress() {
        let pairs: Vec<QaPair> = (0..5)
            .map(|i| QaPair::new(format!("question {}", i), format!("answer {}", i)))
            .collect();
        let embedder = FakeEmbedder::new();
        let mut progress = Vec::new();

        let index = QuestionIndex::build_with_progress(&pairs, &embedder, 2, |done, total| {
            progress.push((done, total))
        })
        .await
        .unwrap();

        assert_eq!(index.len(), 5);
        assert_eq!(embedder.call_count(), 3);
        assert_eq!(progress, vec![(2, 5), (4, 5), (5, 5)]);
        assert_eq!(index.entries()[3].answer, "answer 3");
    }

    #[tokio::test]
    async fn test_embedding_failure_is_surfaced() {
        let pairs = vec![QaPair::new("q", "a")];
        let embedder = FakeEmbedder::failing();
        let err = QuestionIndex::build(&pairs, &embedder, 10).await.unwrap_err();
        assert!(err.is_upstream());
    }
}
