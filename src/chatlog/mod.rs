//! Chat-log processing for the chatbot.
//!
//! An exported conversation goes through three single-pass stages:
//!
//! - [`LineParser`] turns raw lines into [`MessageRecord`]s
//! - [`format_conversations`] merges consecutive turns of one speaker
//! - [`question_answer`] pairs the target speaker's turns with the line
//!   that preceded them
//!
//! ```
//! use parley::chatlog::{format_conversations, question_answer, LineParser};
//!
//! let log = "header\nheader\nheader\n\
//!            [A] [t1] Hi guys\n\
//!            [B] [t2] Hey~\n\
//!            [B] [t3] What are you doing?\n\
//!            [C] [t4] I'm having a meal with ma mates.";
//!
//! let records = LineParser::default().parse(log, 3);
//! let compressed = format_conversations(&records);
//! let pairs = question_answer(&compressed, "C");
//!
//! assert_eq!(pairs[0].question, "Hey~ What are you doing?");
//! assert_eq!(pairs[0].answer, "I'm having a meal with ma mates.");
//! ```

mod compress;
mod parser;
mod segment;

pub use compress::format_conversations;
pub use parser::{LineParser, DEFAULT_LINE_PATTERN};
pub use segment::{question_answer, question_answer_raw};

use serde::{Deserialize, Serialize};

/// One parsed line of a chat log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Who wrote the message.
    pub speaker: String,
    /// The message body.
    pub text: String,
    /// Timestamp exactly as it appeared in the log.
    pub timestamp: String,
}

impl MessageRecord {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
            timestamp: timestamp.into(),
        }
    }
}

/// A run of consecutive messages from one speaker, merged into one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressedRecord {
    pub speaker: String,
    /// Texts of the run joined with single spaces.
    pub text: String,
}

impl CompressedRecord {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
        }
    }
}

/// A question paired with the target speaker's reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

impl QaPair {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }

    /// Both sides carry non-whitespace content.
    pub fn is_complete(&self) -> bool {
        !self.question.trim().is_empty() && !self.answer.trim().is_empty()
    }
}

/// Unique speakers in order of first appearance.
pub fn speakers(records: &[CompressedRecord]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    records
        .iter()
        .filter(|r| seen.insert(r.speaker.as_str()))
        .map(|r| r.speaker.clone())
        .collect()
}
