//! Merges consecutive turns from the same speaker.

use super::{CompressedRecord, MessageRecord};

/// Collapse each run of same-speaker messages into one record.
///
/// ```text
/// A : Hi guys                      A : Hi guys
/// B : Hey~                    =>   B : Hey~ What are you doing?
/// B : What are you doing?          C : I'm having a meal with ma mates.
/// C : I'm having a meal with ma mates.
/// ```
///
/// No two adjacent output records share a speaker, and running this on its
/// own output (via [`MessageRecord`]s built from it) changes nothing.
pub fn format_conversations(records: &[MessageRecord]) -> Vec<CompressedRecord> {
    let mut compressed: Vec<CompressedRecord> = Vec::new();

    for record in records {
        match compressed.last_mut() {
            Some(last) if last.speaker == record.speaker => {
                last.text.push(' ');
                last.text.push_str(&record.text);
            }
            _ => compressed.push(CompressedRecord::new(&record.speaker, &record.text)),
        }
    }

    compressed
}
