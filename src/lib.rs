//! Parley - document QA and chat-log chatbots
//!
//! Two small retrieval applications behind one CLI and HTTP API.
//!
//! # Overview
//!
//! Parley allows you to:
//! - Upload PDF, Word, Excel, CSV and text files and ask questions about them
//! - Turn an exported chat log into a chatbot that answers the way one of its
//!   participants did
//!
//! # Architecture
//!
//! - `config` - Configuration management and prompt templates
//! - `chatlog` - Chat-log parsing, turn compression and QA segmentation
//! - `chatbot` - Question index and per-session chatbot state
//! - `loader` - Document loaders chosen by file extension
//! - `chunking` - Recursive character chunking
//! - `embedding` - Embedding generation
//! - `vector_store` - Vector database abstraction
//! - `rag` - RAG engine for question answering
//! - `orchestrator` - Pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use parley::config::Settings;
//! use parley::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let orchestrator = Orchestrator::new(Settings::load()?)?;
//!     let index = orchestrator.create_index()?;
//!
//!     orchestrator
//!         .ingest_paths(&index, &["handbook.pdf".into()])
//!         .await?;
//!
//!     let response = orchestrator.rag_engine(&index).ask("How many vacation days do I get?").await?;
//!     println!("{}", response.format_for_display());
//!
//!     Ok(())
//! }
//! ```

pub mod chatbot;
pub mod chatlog;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod loader;
pub mod openai;
pub mod orchestrator;
pub mod rag;
pub mod vector_store;

pub use error::{ParleyError, Result};
