//! Splits a compressed conversation into question/answer pairs.

use super::{CompressedRecord, QaPair};
use tracing::debug;

/// Pair every turn of `target` with the most recent turn of anyone else.
///
/// The question carried forward is not cleared once it has been used, so if
/// the target speaks twice without anyone else in between, both replies share
/// the same question. If the target speaks first, the question is empty.
/// Nothing is filtered here; see [`question_answer`].
pub fn question_answer_raw(records: &[CompressedRecord], target: &str) -> Vec<QaPair> {
    let mut pairs = Vec::new();
    let mut current_question = String::new();

    for record in records {
        let mut question = current_question;
        let mut answer: &str = "";

        if record.speaker == target {
            answer = record.text.as_str();
        } else {
            question = record.text.clone();
        }

        if !answer.trim().is_empty() {
            pairs.push(QaPair::new(question.clone(), answer));
        }

        current_question = question;
    }

    pairs
}

/// Like [`question_answer_raw`], dropping pairs with a blank question or answer.
pub fn question_answer(records: &[CompressedRecord], target: &str) -> Vec<QaPair> {
    let raw = question_answer_raw(records, target);
    let total = raw.len();
    let pairs: Vec<QaPair> = raw.into_iter().filter(QaPair::is_complete).collect();

    debug!(
        "Segmented {} QA pairs for '{}' ({} blank pairs dropped)",
        pairs.len(),
        target,
        total - pairs.len()
    );
    pairs
}
