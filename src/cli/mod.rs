//! CLI module for Parley.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Parley - chat with your documents, or with a bot that talks like a friend
///
/// Answers questions about uploaded PDF, Word, Excel, CSV and text files, and
/// turns an exported chat log into a retrieval chatbot that replies the way
/// one of its participants did.
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "PARLEY_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8501")]
        port: u16,
    },

    /// Ask questions about documents
    Ask {
        /// Documents to index (pdf, docx, csv, xlsx, xls, txt)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Ask a single question and exit (interactive when omitted)
        #[arg(short, long)]
        question: Option<String>,

        /// LLM model to use for response generation
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Chat with a bot built from an exported chat log
    Chatbot {
        /// Exported chat log (text)
        log: PathBuf,

        /// Speaker the bot should imitate (prompted when omitted)
        #[arg(short, long)]
        target: Option<String>,
    },

    /// Print the question/answer pairs extracted for a speaker
    Pairs {
        /// Exported chat log (text)
        log: PathBuf,

        /// Speaker whose replies are the answers
        #[arg(short, long)]
        target: String,

        /// Output format
        #[arg(long, value_enum, default_value_t = PairsFormat::Text)]
        format: PairsFormat,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PairsFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
