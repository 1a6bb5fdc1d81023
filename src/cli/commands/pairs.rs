//! Print the question/answer pairs a chatbot would be built from.

use super::chatbot::load_log_file;
use crate::chatbot::ChatbotSession;
use crate::chatlog::{LineParser, QaPair};
use crate::cli::{Output, PairsFormat};
use crate::config::Settings;
use anyhow::Result;
use std::path::Path;

/// Run the pairs command. Works offline: nothing is embedded.
pub fn run_pairs(log: &Path, target: &str, format: PairsFormat, settings: &Settings) -> Result<()> {
    let parser = LineParser::new(&settings.chatbot.line_pattern)?;
    let mut session = ChatbotSession::new(
        parser,
        settings.chatbot.header_lines,
        settings.embedding.batch_size,
    );

    load_log_file(&mut session, log)?;
    let pairs = session.pairs_for(target)?;

    match format {
        PairsFormat::Json => println!("{}", render_json(&pairs)?),
        PairsFormat::Text => {
            Output::header(&format!("{} question/answer pairs for {}", pairs.len(), target));
            for (i, pair) in pairs.iter().enumerate() {
                Output::pair(i + 1, &pair.question, &pair.answer);
            }
        }
    }

    Ok(())
}

fn render_json(pairs: &[QaPair]) -> Result<String> {
    Ok(serde_json::to_string_pretty(pairs)?)
}
