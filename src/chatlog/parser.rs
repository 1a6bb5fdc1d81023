//! Line parser for exported chat logs.
//!
//! Every line after the header is expected to look like
//! `[speaker] [timestamp] message`. Lines that don't match are skipped.

use super::MessageRecord;
use crate::error::{ParleyError, Result};
use regex::Regex;
use tracing::debug;

/// Non-greedy speaker and timestamp, greedy message.
///
/// A message that itself contains `] [` is split at the first two bracket
/// groups only.
pub const DEFAULT_LINE_PATTERN: &str = r"\[(.*?)\] \[(.*?)\] (.*)";

/// Matches log lines and extracts speaker, timestamp and text.
#[derive(Debug, Clone)]
pub struct LineParser {
    pattern: Regex,
}

impl LineParser {
    /// Build a parser from a custom pattern.
    ///
    /// Capture groups 1, 2 and 3 are read as speaker, timestamp and text.
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| ParleyError::Config(format!("Invalid chat line pattern: {}", e)))?;

        // captures_len counts the implicit whole-match group
        if pattern.captures_len() < 4 {
            return Err(ParleyError::Config(format!(
                "Chat line pattern needs 3 capture groups (speaker, timestamp, text), found {}",
                pattern.captures_len() - 1
            )));
        }

        Ok(Self { pattern })
    }

    /// Parse a single line. Returns `None` when the line doesn't match.
    pub fn parse_line(&self, line: &str) -> Option<MessageRecord> {
        let caps = self.pattern.captures(line)?;
        let group = |i: usize| caps.get(i).map(|m| m.as_str()).unwrap_or_default();
        Some(MessageRecord::new(group(1), group(3), group(2)))
    }

    /// Parse a whole log, skipping `header_lines` lines first.
    pub fn parse(&self, content: &str, header_lines: usize) -> Vec<MessageRecord> {
        let mut skipped = 0usize;
        let records: Vec<MessageRecord> = content
            .split('\n')
            .skip(header_lines)
            .filter_map(|line| {
                let record = self.parse_line(line.strip_suffix('\r').unwrap_or(line));
                if record.is_none() {
                    skipped += 1;
                }
                record
            })
            .collect();

        debug!(
            "Parsed {} message records ({} lines skipped)",
            records.len(),
            skipped
        );
        records
    }
}

impl Default for LineParser {
    fn default() -> Self {
        Self {
            pattern: Regex::new(DEFAULT_LINE_PATTERN).expect("default line pattern is valid"),
        }
    }
}
