//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::rag::{RagEngine, RagResponse};
use anyhow::Result;
use console::style;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Run the ask command.
pub async fn run_ask(
    files: &[PathBuf],
    question: Option<String>,
    model: Option<String>,
    mut settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ask) {
        Output::error(&format!("{}", e));
        Output::info("Run 'parley doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    if let Some(model) = model {
        settings.rag.model = model;
    }
    let streaming = settings.rag.streaming;

    let orchestrator = Orchestrator::new(settings)?;
    let index = orchestrator.create_index()?;

    let spinner = Output::spinner(&format!("Indexing {} file(s)...", files.len()));
    let report = orchestrator.ingest_paths(&index, files).await;
    spinner.finish_and_clear();
    let report = report?;

    for failure in report.failures() {
        Output::warning(&format!(
            "Skipped {}: {}",
            failure.name,
            failure.error.as_deref().unwrap_or("unknown error")
        ));
    }

    if report.chunks_indexed == 0 {
        anyhow::bail!("None of the files could be indexed");
    }
    Output::success(&format!(
        "Indexed {} chunks from {} file(s)",
        report.chunks_indexed,
        report.files.iter().filter(|f| f.is_ok()).count()
    ));

    let engine = orchestrator.rag_engine(&index);

    if let Some(question) = question {
        return answer(&engine, &question, streaming).await;
    }

    println!(
        "{}\n",
        style("Ask about your documents, or type 'exit' to quit.").dim()
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

        if let Err(e) = answer(&engine, input, streaming).await {
            Output::error(&format!("Error: {}", e));
        }
    }

    Ok(())
}

async fn answer(engine: &RagEngine, question: &str, streaming: bool) -> Result<()> {
    let response = if streaming {
        print!("\n{} ", style("Parley:").cyan().bold());
        io::stdout().flush()?;

        let response = engine
            .ask_streaming(question, &mut |token: &str| {
                print!("{}", token);
                let _ = io::stdout().flush();
            })
            .await;
        println!("\n");
        response?
    } else {
        let spinner = Output::spinner("Searching documents...");
        let response = engine.ask(question).await;
        spinner.finish_and_clear();
        let response = response?;
        println!("\n{}\n", response.answer);
        response
    };

    print_sources(&response);
    Ok(())
}

fn print_sources(response: &RagResponse) {
    if response.sources.is_empty() {
        return;
    }

    Output::header("Sources");
    for source in &response.sources {
        Output::source(&source.citation(), source.score, &source.content);
    }
    println!();
}
