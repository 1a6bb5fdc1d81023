//! Interactive chatbot built from an exported chat log.

use crate::chatbot::ChatbotSession;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::{Context, Result};
use console::style;
use std::io::{self, BufRead, Write};
use std::path::Path;

/// Run the interactive chatbot command.
pub async fn run_chatbot(log: &Path, target: Option<String>, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Chatbot) {
        Output::error(&format!("{}", e));
        Output::info("Run 'parley doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;
    let embedder = orchestrator.embedder();
    let mut session = orchestrator.chatbot_session()?;

    load_log_file(&mut session, log)?;

    let target = match target {
        Some(target) => target,
        None => prompt_for_speaker(session.speakers())?,
    };

    let pb = Output::progress_bar(0, &format!("Learning how {} replies...", target));
    let progress = pb.clone();
    let index = session
        .select_target_with_progress(&target, embedder.as_ref(), move |done, total| {
            progress.set_length(total as u64);
            progress.set_position(done as u64);
        })
        .await;
    pb.finish_and_clear();
    let index = index?;

    Output::success(&format!("{} is ready ({} remembered replies)", target, index.len()));
    println!(
        "{}\n",
        style("Type a message, 'clear' to reset the conversation, or 'exit' to quit.").dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        if input.eq_ignore_ascii_case("clear") {
            session.clear_transcript();
            Output::info("Conversation cleared.");
            continue;
        }

        match session.ask(input, embedder.as_ref()).await {
            Ok(reply) => {
                println!("\n{} {}", style(format!("{}:", target)).cyan().bold(), reply.answer);
                println!(
                    "{}\n",
                    style(format!("  (replying to \"{}\", score {:.2})", reply.question, reply.score)).dim()
                );
            }
            Err(e) => Output::error(&format!("Error: {}", e)),
        }
    }

    Ok(())
}

/// Read and parse a chat log into the session, failing when no line matched.
pub(super) fn load_log_file(session: &mut ChatbotSession, path: &Path) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("chat log");

    let log = session.load_log(name, &bytes)?;
    if log.speakers.is_empty() {
        anyhow::bail!(
            "No messages in {} matched the chat-log line format (check chatbot.line_pattern and chatbot.header_lines)",
            path.display()
        );
    }

    Output::info(&format!(
        "Loaded {} turns from {} speakers",
        log.records.len(),
        log.speakers.len()
    ));
    Ok(())
}

fn prompt_for_speaker(speakers: &[String]) -> Result<String> {
    Output::header("Who should the chatbot be?");
    for (i, speaker) in speakers.iter().enumerate() {
        Output::choice(i + 1, speaker);
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("\n{} ", style("Number:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            anyhow::bail!("No speaker selected");
        }

        match parse_choice(input.trim(), speakers.len()) {
            Some(i) => return Ok(speakers[i].clone()),
            None => Output::warning(&format!("Enter a number between 1 and {}", speakers.len())),
        }
    }
}

/// One-based menu choice to a zero-based index.
fn parse_choice(input: &str, count: usize) -> Option<usize> {
    input
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=count).contains(n))
        .map(|n| n - 1)
}
