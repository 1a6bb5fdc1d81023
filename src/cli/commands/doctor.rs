//! Doctor command - verify configuration and environment.

use crate::chatlog::LineParser;
use crate::cli::Output;
use crate::config::Settings;
use console::style;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Parley Doctor");
    println!();

    let sections = [
        ("API Configuration", vec![check_openai_api_key(std::env::var("OPENAI_API_KEY").ok())]),
        ("Storage", vec![check_temp_dir(settings), check_vector_store(settings)]),
        ("Chat logs", vec![check_line_pattern(settings)]),
        ("Configuration", vec![check_config_file()]),
    ];

    let mut errors = 0;
    let mut warnings = 0;

    for (title, checks) in &sections {
        println!("{}", style(title).bold());
        for check in checks {
            check.print();
            match check.status {
                CheckStatus::Error => errors += 1,
                CheckStatus::Warning => warnings += 1,
                CheckStatus::Ok => {}
            }
        }
        println!();
    }

    if errors > 0 {
        Output::error(&format!("{} error(s) found. Please fix them before using Parley.", errors));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Parley is ready to use.");
    }

    Ok(())
}

fn check_openai_api_key(key: Option<String>) -> CheckResult {
    match key {
        Some(key) if key.starts_with("sk-") && key.len() > 20 => {
            let masked = format!("{}...{}", &key[..7], &key[key.len() - 4..]);
            CheckResult::ok("OPENAI_API_KEY", &format!("configured ({})", masked))
        }
        Some(key) if key.is_empty() => CheckResult::error(
            "OPENAI_API_KEY",
            "empty",
            "Set with: export OPENAI_API_KEY='sk-...'",
        ),
        Some(_) => CheckResult::warning(
            "OPENAI_API_KEY",
            "set but format looks unusual",
            "Expected format: sk-... (OpenAI API key)",
        ),
        None => CheckResult::error(
            "OPENAI_API_KEY",
            "not set",
            "Set with: export OPENAI_API_KEY='sk-...'",
        ),
    }
}

/// Session indexes and upload spill files live under the temp directory.
fn check_temp_dir(settings: &Settings) -> CheckResult {
    let dir = settings.temp_dir();
    let probe = std::fs::create_dir_all(&dir).and_then(|_| tempfile::tempfile_in(&dir));
    match probe {
        Ok(_) => CheckResult::ok("Temp directory", &dir.display().to_string()),
        Err(e) => CheckResult::error(
            "Temp directory",
            &format!("{} is not writable ({})", dir.display(), e),
            "Set general.temp_dir to a writable directory",
        ),
    }
}

fn check_vector_store(settings: &Settings) -> CheckResult {
    match settings.vector_store.provider.as_str() {
        "sqlite" | "memory" => CheckResult::ok("Vector store", &settings.vector_store.provider),
        other => CheckResult::error(
            "Vector store",
            &format!("unknown provider '{}'", other),
            "Use 'sqlite' or 'memory'",
        ),
    }
}

fn check_line_pattern(settings: &Settings) -> CheckResult {
    match LineParser::new(&settings.chatbot.line_pattern) {
        Ok(_) => CheckResult::ok(
            "Line pattern",
            &format!(
                "{} (skipping {} header lines)",
                settings.chatbot.line_pattern, settings.chatbot.header_lines
            ),
        ),
        Err(e) => CheckResult::error(
            "Line pattern",
            &e.to_string(),
            "chatbot.line_pattern needs speaker, timestamp and message capture groups",
        ),
    }
}

fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &config_path.display().to_string())
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: parley config edit",
        )
    }
}
