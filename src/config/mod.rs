//! Configuration module for Parley.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{Prompts, RagPrompts};
pub use settings::{
    ChatbotSettings, ChunkingSettings, EmbeddingSettings, GeneralSettings, OpenAISettings,
    PromptSettings, RagSettings, ServerSettings, Settings, VectorStoreSettings,
};
