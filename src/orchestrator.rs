//! Pipeline orchestrator for Parley.
//!
//! Coordinates document ingestion (load, chunk, embed, index) and hands out
//! RAG engines and chatbot sessions configured from settings.

use crate::chatbot::ChatbotSession;
use crate::chatlog::LineParser;
use crate::chunking::{Chunker, ChunkingConfig, RecursiveChunker};
use crate::config::{Prompts, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{ParleyError, Result};
use crate::loader::load_upload;
use crate::rag::{Generator, OpenAIGenerator, RagEngine};
use crate::vector_store::{Document, IndexedSource, MemoryVectorStore, SqliteVectorStore, VectorStore};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{info, instrument, warn};

/// A file received from the user.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read a file from disk, keeping only its file name.
    pub fn read(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ParleyError::InvalidInput(format!("Not a file: {}", path.display())))?;
        Ok(Self::new(name, std::fs::read(path)?))
    }
}

/// A session's document vector index, stored in a temporary directory that
/// is removed when the index is dropped.
pub struct DocumentIndex {
    dir: TempDir,
    store: Arc<dyn VectorStore>,
}

impl DocumentIndex {
    /// Create an empty index under the configured temporary directory.
    pub fn create(settings: &Settings) -> Result<Self> {
        let base = settings.temp_dir();
        std::fs::create_dir_all(&base)?;
        let dir = tempfile::Builder::new().prefix("parley-").tempdir_in(&base)?;

        let store: Arc<dyn VectorStore> = match settings.vector_store.provider.as_str() {
            "sqlite" => Arc::new(SqliteVectorStore::new(&dir.path().join("index.db"))?),
            "memory" => Arc::new(MemoryVectorStore::new()),
            other => {
                return Err(ParleyError::Config(format!(
                    "Unknown vector store provider: {}",
                    other
                )))
            }
        };

        info!("Created document index at {:?}", dir.path());
        Ok(Self { dir, store })
    }

    pub fn store(&self) -> Arc<dyn VectorStore> {
        self.store.clone()
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub async fn sources(&self) -> Result<Vec<IndexedSource>> {
        self.store.list_sources().await
    }
}

/// Outcome of ingesting one file.
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub name: String,
    pub chunks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of ingesting a batch of uploaded files.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub files: Vec<FileOutcome>,
    pub chunks_indexed: usize,
}

impl IngestReport {
    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files.iter().filter(|f| !f.is_ok())
    }
}

/// The main orchestrator for the Parley pipeline.
pub struct Orchestrator {
    settings: Settings,
    prompts: Prompts,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
}

impl Orchestrator {
    /// Create a new orchestrator backed by OpenAI.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::from_settings(&settings)?);
        let generator: Arc<dyn Generator> = Arc::new(OpenAIGenerator::from_settings(&settings, None)?);

        Ok(Self::with_components(settings, prompts, embedder, generator))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            settings,
            prompts,
            embedder,
            generator,
        }
    }

    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Create an empty document index for a session.
    pub fn create_index(&self) -> Result<DocumentIndex> {
        DocumentIndex::create(&self.settings)
    }

    /// Load, chunk, embed and index uploaded files.
    ///
    /// Failures are recorded per file and the remaining files are still
    /// processed. Re-uploading a file name replaces its previous chunks.
    #[instrument(skip(self, index, files), fields(files = files.len()))]
    pub async fn ingest(&self, index: &DocumentIndex, files: Vec<UploadedFile>) -> Result<IngestReport> {
        let chunker = RecursiveChunker::new(ChunkingConfig::try_from(&self.settings.chunking)?);
        let mut report = IngestReport::default();

        for file in files {
            let name = file.name.clone();
            let outcome = match self.ingest_file(index, &chunker, file).await {
                Ok(chunks) => {
                    report.chunks_indexed += chunks;
                    FileOutcome {
                        name,
                        chunks,
                        error: None,
                    }
                }
                Err(e) => {
                    warn!("Failed to ingest {}: {}", name, e);
                    FileOutcome {
                        name,
                        chunks: 0,
                        error: Some(e.to_string()),
                    }
                }
            };
            report.files.push(outcome);
        }

        info!(
            "Indexed {} chunks from {} files ({} failed)",
            report.chunks_indexed,
            report.files.len(),
            report.failures().count()
        );
        Ok(report)
    }

    /// Read files from disk and ingest them. Unreadable files are reported like load failures.
    pub async fn ingest_paths(&self, index: &DocumentIndex, paths: &[PathBuf]) -> Result<IngestReport> {
        let mut files = Vec::new();
        let mut unreadable = Vec::new();

        for path in paths {
            match UploadedFile::read(path) {
                Ok(file) => files.push(file),
                Err(e) => unreadable.push(FileOutcome {
                    name: path.display().to_string(),
                    chunks: 0,
                    error: Some(e.to_string()),
                }),
            }
        }

        let mut report = self.ingest(index, files).await?;
        report.files.extend(unreadable);
        Ok(report)
    }

    async fn ingest_file(
        &self,
        index: &DocumentIndex,
        chunker: &RecursiveChunker,
        file: UploadedFile,
    ) -> Result<usize> {
        let spill_dir = index.path().join("uploads");
        let UploadedFile { name, bytes } = file;
        let loaded = {
            let name = name.clone();
            tokio::task::spawn_blocking(move || load_upload(&name, &bytes, &spill_dir))
                .await
                .map_err(|e| ParleyError::Loader(format!("loader task failed: {}", e)))??
        };

        let chunks = chunker.chunk_documents(&loaded);
        if chunks.is_empty() {
            return Err(ParleyError::EmptyCorpus(format!("no text could be extracted from {}", name)));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let documents: Vec<Document> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| Document::new(chunk, embedding))
            .collect();

        let store = index.store();
        store.delete_by_source(&name).await?;
        store.upsert_batch(&documents).await
    }

    /// Build a RAG engine over a session's document index.
    pub fn rag_engine(&self, index: &DocumentIndex) -> RagEngine {
        RagEngine::new(
            index.store(),
            self.embedder.clone(),
            self.generator.clone(),
            &self.settings.rag,
        )
        .with_prompts(self.prompts.clone())
    }

    /// Create a chatbot session configured from settings.
    pub fn chatbot_session(&self) -> Result<ChatbotSession> {
        let parser = LineParser::new(&self.settings.chatbot.line_pattern)?;
        Ok(ChatbotSession::new(
            parser,
            self.settings.chatbot.header_lines,
            self.settings.embedding.batch_size,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::testing::FakeEmbedder;
    use crate::rag::testing::FakeGenerator;

    fn orchestrator(dir: &Path, provider: &str) -> (Orchestrator, Arc<FakeGenerator>) {
        let mut settings = Settings::default();
        settings.general.temp_dir = dir.to_string_lossy().to_string();
        settings.vector_store.provider = provider.to_string();
        settings.chunking.chunk_size = 40;
        settings.chunking.chunk_overlap = 0;

        let generator = Arc::new(FakeGenerator::replying("From the notes."));
        let orchestrator = Orchestrator::with_components(
            settings,
            Prompts::default(),
            Arc::new(FakeEmbedder::new()),
            generator.clone(),
        );
        (orchestrator, generator)
    }

    #[tokio::test]
    async fn test_ingest_reports_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let (orchestrator, _) = orchestrator(dir.path(), "memory");
        let index = orchestrator.create_index().unwrap();

        let report = orchestrator
            .ingest(
                &index,
                vec![
                    UploadedFile::new("notes.txt", b"The launch is on Friday.\n\nBring snacks for the team.".to_vec()),
                    UploadedFile::new("slides.pptx", b"binary".to_vec()),
                    UploadedFile::new("blank.txt", b"   ".to_vec()),
                ],
            )
            .await
            .unwrap();

        assert_eq!(report.files.len(), 3);
        assert_eq!(report.files[0].chunks, 2);
        assert!(report.files[0].is_ok());
        assert!(!report.files[1].is_ok());
        assert!(!report.files[2].is_ok());
        assert_eq!(report.chunks_indexed, 2);
        assert_eq!(report.failures().count(), 2);
    }

    #[tokio::test]
    async fn test_reingest_replaces_source() {
        let dir = tempfile::tempdir().unwrap();
        let (orchestrator, _) = orchestrator(dir.path(), "sqlite");
        let index = orchestrator.create_index().unwrap();

        let first = UploadedFile::new("notes.txt", b"one\n\ntwo\n\nthree".to_vec());
        orchestrator.ingest(&index, vec![first]).await.unwrap();
        let second = UploadedFile::new("notes.txt", b"replacement".to_vec());
        orchestrator.ingest(&index, vec![second]).await.unwrap();

        let sources = index.sources().await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].chunk_count, 1);
    }

    #[test]
    fn test_index_directory_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let (orchestrator, _) = orchestrator(dir.path(), "sqlite");
        let index = orchestrator.create_index().unwrap();
        let path = index.path().to_path_buf();
        assert!(path.join("index.db").exists());

        drop(index);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_rag_engine_answers_from_index() {
        let dir = tempfile::tempdir().unwrap();
        let (orchestrator, generator) = orchestrator(dir.path(), "memory");
        let index = orchestrator.create_index().unwrap();

        orchestrator
            .ingest(&index, vec![UploadedFile::new("notes.txt", b"The launch is on Friday.".to_vec())])
            .await
            .unwrap();

        let response = orchestrator.rag_engine(&index).ask("When is the launch?").await.unwrap();
        assert_eq!(response.answer, "From the notes.");
        assert_eq!(response.sources[0].source, "notes.txt");
        assert!(generator.last_request().unwrap().user.contains("The launch is on Friday."));
    }

    #[tokio::test]
    async fn test_ingest_paths_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let (orchestrator, _) = orchestrator(dir.path(), "memory");
        let index = orchestrator.create_index().unwrap();

        let report = orchestrator
            .ingest_paths(&index, &[dir.path().join("missing.txt")])
            .await
            .unwrap();
        assert_eq!(report.files.len(), 1);
        assert!(!report.files[0].is_ok());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (orchestrator, _) = orchestrator(dir.path(), "pinecone");
        assert!(matches!(orchestrator.create_index(), Err(ParleyError::Config(_))));
    }

    #[test]
    fn test_chatbot_session_uses_settings() {
        let dir = tempfile::tempdir().unwrap();
        let (orchestrator, _) = orchestrator(dir.path(), "memory");
        let session = orchestrator.chatbot_session().unwrap();
        assert!(session.log().is_none());
    }
}
