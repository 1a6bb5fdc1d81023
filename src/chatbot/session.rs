//! Per-session chatbot state.

use super::index::{QuestionIndex, RetrievedAnswer};
use crate::chatlog::{self, CompressedRecord, LineParser, QaPair};
use crate::embedding::Embedder;
use crate::error::{ParleyError, Result};
use crate::loader::decode_text;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// One exchange in a session transcript.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatTurn {
    pub user: String,
    pub bot: String,
}

/// A parsed chat log.
#[derive(Debug, Clone)]
pub struct LoadedLog {
    /// Changes on every upload, even for identical content.
    pub upload_id: Uuid,
    pub file_name: String,
    pub records: Vec<CompressedRecord>,
    pub speakers: Vec<String>,
}

/// Chatbot state for one user: the uploaded log, the selected target, the
/// cached question indexes and the transcript.
pub struct ChatbotSession {
    parser: LineParser,
    header_lines: usize,
    batch_size: usize,
    log: Option<LoadedLog>,
    target: Option<String>,
    cache: HashMap<(Uuid, String), Arc<QuestionIndex>>,
    transcript: Vec<ChatTurn>,
}

impl ChatbotSession {
    pub fn new(parser: LineParser, header_lines: usize, batch_size: usize) -> Self {
        Self {
            parser,
            header_lines,
            batch_size,
            log: None,
            target: None,
            cache: HashMap::new(),
            transcript: Vec::new(),
        }
    }

    /// Parse an uploaded log, replacing any previous one.
    ///
    /// Cached indexes, the selected target and the transcript all belong to
    /// the previous upload and are dropped.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub fn load_log(&mut self, file_name: &str, bytes: &[u8]) -> Result<&LoadedLog> {
        let content = decode_text(bytes)?;
        let records = self.parser.parse(&content, self.header_lines);
        let records = chatlog::format_conversations(&records);
        let speakers = chatlog::speakers(&records);

        info!(
            "Loaded chat log '{}': {} turns, {} speakers",
            file_name,
            records.len(),
            speakers.len()
        );

        self.reset();
        Ok(&*self.log.insert(LoadedLog {
            upload_id: Uuid::new_v4(),
            file_name: file_name.to_string(),
            records,
            speakers,
        }))
    }

    pub fn log(&self) -> Option<&LoadedLog> {
        self.log.as_ref()
    }

    pub fn speakers(&self) -> &[String] {
        self.log.as_ref().map(|l| l.speakers.as_slice()).unwrap_or_default()
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// QA pairs for `speaker` in the loaded log, blank pairs removed.
    pub fn pairs_for(&self, speaker: &str) -> Result<Vec<QaPair>> {
        let log = self.require_log()?;
        if !log.speakers.iter().any(|s| s == speaker) {
            return Err(ParleyError::InvalidInput(format!(
                "'{}' does not appear in the chat log",
                speaker
            )));
        }
        Ok(chatlog::question_answer(&log.records, speaker))
    }

    /// Make `speaker` the chatbot, embedding their questions unless an index
    /// for this upload and speaker is already cached.
    pub async fn select_target(&mut self, speaker: &str, embedder: &dyn Embedder) -> Result<Arc<QuestionIndex>> {
        self.select_target_with_progress(speaker, embedder, |_, _| {}).await
    }

    /// Like [`ChatbotSession::select_target`], reporting embedding progress.
    pub async fn select_target_with_progress<F>(
        &mut self,
        speaker: &str,
        embedder: &dyn Embedder,
        on_progress: F,
    ) -> Result<Arc<QuestionIndex>>
    where
        F: FnMut(usize, usize) + Send,
    {
        let pairs = self.pairs_for(speaker)?;
        let key = (self.require_log()?.upload_id, speaker.to_string());

        // A failed selection must not leave the previous speaker answering.
        if self.target.as_deref() != Some(speaker) {
            self.transcript.clear();
        }
        self.target = None;

        let index = match self.cache.get(&key) {
            Some(index) => {
                info!("Reusing cached question index for '{}'", speaker);
                index.clone()
            }
            None => {
                let index = Arc::new(
                    QuestionIndex::build_with_progress(&pairs, embedder, self.batch_size, on_progress)
                        .await?,
                );
                self.cache.insert(key, index.clone());
                index
            }
        };

        self.target = Some(speaker.to_string());
        Ok(index)
    }

    /// Answer a user message as the selected target and record the exchange.
    pub async fn ask(&mut self, message: &str, embedder: &dyn Embedder) -> Result<RetrievedAnswer> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ParleyError::InvalidInput("message is empty".to_string()));
        }

        let index = self.current_index()?;
        let retrieved = index.answer(message, embedder).await?;

        self.transcript.push(ChatTurn {
            user: message.to_string(),
            bot: retrieved.answer.clone(),
        });
        Ok(retrieved)
    }

    pub fn transcript(&self) -> &[ChatTurn] {
        &self.transcript
    }

    pub fn clear_transcript(&mut self) {
        self.transcript.clear();
    }

    /// Forget the uploaded log and everything derived from it.
    pub fn reset(&mut self) {
        self.log = None;
        self.target = None;
        self.cache.clear();
        self.transcript.clear();
    }

    fn require_log(&self) -> Result<&LoadedLog> {
        self.log
            .as_ref()
            .ok_or_else(|| ParleyError::InvalidInput("no chat log has been uploaded".to_string()))
    }

    fn current_index(&self) -> Result<Arc<QuestionIndex>> {
        let log = self.require_log()?;
        let target = self
            .target
            .as_ref()
            .ok_or_else(|| ParleyError::InvalidInput("no chatbot target has been selected".to_string()))?;

        self.cache
            .get(&(log.upload_id, target.clone()))
            .cloned()
            .ok_or_else(|| ParleyError::InvalidInput("no chatbot target has been selected".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::testing::FakeEmbedder;

    const LOG: &str = "Chat with A, B, C\nSaved 2024-01-01\n\n\
        [A] [t1] Hi guys\n\
        [B] [t2] Hey~\n\
        [B] [t3] What are you doing?\n\
        [C] [t4] I'm having a meal with ma mates.\n\
        [A] [t5] where are you eating\n\
        [C] [t6] downtown\n";

    fn session() -> ChatbotSession {
        ChatbotSession::new(LineParser::default(), 3, 100)
    }

    #[test]
    fn test_load_log_lists_speakers() {
        let mut session = session();
        let log = session.load_log("talk.txt", LOG.as_bytes()).unwrap();
        assert_eq!(log.speakers, vec!["A", "B", "C"]);
        assert_eq!(log.records.len(), 5);
    }

    #[tokio::test]
    async fn test_select_and_ask() {
        let mut session = session();
        session.load_log("talk.txt", LOG.as_bytes()).unwrap();
        let embedder = FakeEmbedder::new();

        let index = session.select_target("C", &embedder).await.unwrap();
        assert_eq!(index.len(), 2);

        let reply = session.ask("where are you eating tonight", &embedder).await.unwrap();
        assert_eq!(reply.answer, "downtown");
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.transcript()[0].bot, "downtown");
    }

    #[tokio::test]
    async fn test_failed_selection_clears_previous_target() {
        let mut session = session();
        session
            .load_log("talk.txt", b"h\nh\nh\n[A] [1] opener\n[B] [2] how are you\n[C] [3] fine thanks\n")
            .unwrap();
        let embedder = FakeEmbedder::new();

        session.select_target("C", &embedder).await.unwrap();
        session.ask("how are you", &embedder).await.unwrap();

        let result = session.select_target("A", &embedder).await;
        assert!(matches!(result, Err(ParleyError::EmptyCorpus(_))));
        assert_eq!(session.target(), None);
        assert!(session.transcript().is_empty());
        assert!(session.ask("hello", &embedder).await.is_err());
    }

    #[tokio::test]
    async fn test_index_is_cached_per_upload_and_target() {
        let mut session = session();
        session.load_log("talk.txt", LOG.as_bytes()).unwrap();
        let embedder = FakeEmbedder::new();

        session.select_target("C", &embedder).await.unwrap();
        session.select_target("C", &embedder).await.unwrap();
        assert_eq!(embedder.call_count(), 1);

        // same bytes, new upload: cache must not be reused
        session.load_log("talk.txt", LOG.as_bytes()).unwrap();
        assert!(session.target().is_none());
        session.select_target("C", &embedder).await.unwrap();
        assert_eq!(embedder.call_count(), 2);
    }

    #[tokio::test]
    async fn test_unknown_target_rejected() {
        let mut session = session();
        session.load_log("talk.txt", LOG.as_bytes()).unwrap();
        let err = session.select_target("Z", &FakeEmbedder::new()).await.unwrap_err();
        assert!(matches!(err, ParleyError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_target_without_replies_is_empty_corpus() {
        let mut session = session();
        // A only speaks first, so their only pair has a blank question
        session
            .load_log("talk.txt", b"h\nh\nh\n[A] [t1] hello\n[B] [t2] hi\n")
            .unwrap();
        let embedder = FakeEmbedder::new();

        let err = session.select_target("A", &embedder).await.unwrap_err();
        assert!(matches!(err, ParleyError::EmptyCorpus(_)));
        assert_eq!(embedder.call_count(), 0);

        let err = session.ask("anyone?", &embedder).await.unwrap_err();
        assert!(matches!(err, ParleyError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_ask_requires_target_and_message() {
        let mut session = session();
        let embedder = FakeEmbedder::new();
        assert!(session.ask("hi", &embedder).await.is_err());

        session.load_log("talk.txt", LOG.as_bytes()).unwrap();
        assert!(session.ask("hi", &embedder).await.is_err());

        session.select_target("C", &embedder).await.unwrap();
        let err = session.ask("   ", &embedder).await.unwrap_err();
        assert!(matches!(err, ParleyError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_switching_target_clears_transcript() {
        let mut session = session();
        session.load_log("talk.txt", LOG.as_bytes()).unwrap();
        let embedder = FakeEmbedder::new();

        session.select_target("C", &embedder).await.unwrap();
        session.ask("hello", &embedder).await.unwrap();
        assert_eq!(session.transcript().len(), 1);

        session.select_target("B", &embedder).await.unwrap();
        assert!(session.transcript().is_empty());
        assert_eq!(session.target(), Some("B"));
    }

    #[test]
    fn test_reset_forgets_everything() {
        let mut session = session();
        session.load_log("talk.txt", LOG.as_bytes()).unwrap();
        session.reset();
        assert!(session.log().is_none());
        assert!(session.speakers().is_empty());
    }
}
