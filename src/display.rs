//! Colored CLI display utilities for bridge output.
//!
//! This module provides functions for printing colored, formatted output
//! to the terminal while checking, detecting, and talking to Copilot.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::copilot::{CopilotMessage, MessagePayload};
use crate::detect::{DetectionResult, Readiness};
use crate::error::{format_error, ClassifiedError};

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Truncate a string to a maximum number of characters, adding ellipsis if truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    }
}

/// Print a progress step.
pub fn print_step(text: &str) {
    println!("{} {} {}", timestamp().dimmed(), "[STEP]".blue().bold(), text);
    let _ = io::stdout().flush();
}

/// Print a success line.
pub fn print_ok(text: &str) {
    println!("{} {} {}", timestamp().dimmed(), "[OK]".green().bold(), text);
    let _ = io::stdout().flush();
}

/// Print an indented detail line.
pub fn print_detail(label: &str, value: &str) {
    println!("    {} {}", format!("{label}:").dimmed(), value);
    let _ = io::stdout().flush();
}

/// Print the environment readiness report.
///
/// Every failing component gets its own suggestion line.
pub fn print_readiness(readiness: &Readiness) {
    if readiness.is_ready() {
        print_ok("Copilot setup verified");
        let extension = readiness.extension();
        if let Some(method) = extension.method {
            print_detail("Install method", method.as_str());
        }
        if let Some(version) = &extension.version {
            print_detail("Version", version);
        }
        if let Some(user) = &readiness.auth().user {
            print_detail("GitHub user", user);
        }
        return;
    }

    eprintln!(
        "{} {} Copilot setup incomplete",
        timestamp().dimmed(),
        "[SETUP]".red().bold()
    );

    if !readiness.tool().installed {
        eprintln!("  {} GitHub CLI not installed", "-".yellow());
        eprintln!("    {}", "Install: https://cli.github.com/".dimmed());
    }
    if !readiness.auth().authenticated {
        eprintln!("  {} Not authenticated with GitHub", "-".yellow());
        eprintln!("    {}", "Run: gh auth login".dimmed());
    }
    if !readiness.extension().installed {
        eprintln!("  {} Copilot CLI not installed", "-".yellow());
        eprintln!("    {}", "Install: npm install -g @github/copilot".dimmed());
    }
    let _ = io::stderr().flush();
}

/// Print the outcome of executable detection.
pub fn print_detection(result: &DetectionResult) {
    if !result.success {
        eprintln!(
            "{} {} Failed to detect Copilot CLI",
            timestamp().dimmed(),
            "[DETECT]".red().bold()
        );
        if let Some(error) = &result.error {
            eprintln!("    {} {}", "Error:".dimmed(), error);
        }
        let _ = io::stderr().flush();
        return;
    }

    print_ok("Copilot CLI detected");
    if let Some(command) = &result.command {
        if let Some(path) = command.resolved_path() {
            print_detail("Path", &path.display().to_string());
        }
        print_detail("Command", &command.to_string());
    }
    if let Some(version) = result.version() {
        print_detail("Version", version);
    }
}

/// Print one inbound message.
pub fn print_message(message: &CopilotMessage) {
    let ts = timestamp();
    match &message.payload {
        MessagePayload::Ready => {
            println!("{} {}", ts.dimmed(), "[READY]".green().bold());
        }
        MessagePayload::AssistantMessage { .. } => {
            println!(
                "{} {} {}",
                ts.dimmed(),
                "[COPILOT]".cyan().bold(),
                message.text().unwrap_or_default()
            );
        }
        MessagePayload::Thinking { text } => {
            println!(
                "{} {} {}",
                ts.dimmed(),
                "[THINKING]".magenta().bold(),
                truncate(text, 200).dimmed()
            );
        }
        MessagePayload::FileEdit {
            files, description, ..
        } => {
            let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
            println!(
                "{} {} {} {}",
                ts.dimmed(),
                "[EDIT]".yellow().bold(),
                paths.join(", "),
                description.as_deref().unwrap_or_default().dimmed()
            );
        }
        MessagePayload::CommandExecution {
            command,
            output,
            exit_code,
        } => {
            let code = exit_code.map_or(String::new(), |c| format!("exit={c}"));
            println!(
                "{} {} {} {}",
                ts.dimmed(),
                "[EXEC]".blue().bold(),
                command.bold(),
                code.dimmed()
            );
            if let Some(output) = output.as_deref().filter(|o| !o.is_empty()) {
                println!("{}", truncate(output, 500).dimmed());
            }
        }
        MessagePayload::Error { .. } => {
            println!(
                "{} {} {}",
                ts.dimmed(),
                "[REMOTE]".red().bold(),
                message.text().unwrap_or_default().red()
            );
        }
        MessagePayload::Unknown { kind, fields } => {
            println!(
                "{} {} {}",
                ts.dimmed(),
                format!("[{}]", kind.to_uppercase()).dimmed(),
                unknown_summary(fields).dimmed()
            );
        }
    }
    let _ = io::stdout().flush();
}

/// Compact JSON of an unmodelled message's fields.
fn unknown_summary(fields: &serde_json::Map<String, serde_json::Value>) -> String {
    if fields.is_empty() {
        return String::new();
    }
    truncate(&serde_json::Value::Object(fields.clone()).to_string(), 300)
}

/// Print the process exit.
pub fn print_exit(code: Option<i32>) {
    let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
    println!(
        "{} {} Copilot process exited with code {}",
        timestamp().dimmed(),
        "[EXIT]".yellow().bold(),
        code
    );
    let _ = io::stdout().flush();
}

/// Print a classified error, plus the recovery action when it is recoverable.
pub fn print_error(error: &ClassifiedError, debug: bool) {
    eprintln!("{}", format_error(error, debug).red());
    if error.recoverable {
        eprintln!(
            "{} This error might be recoverable.",
            "[RECOVER]".yellow().bold()
        );
        if let Some(action) = &error.recovery_action {
            eprintln!("    {}", action.dimmed());
        }
    }
    let _ = io::stderr().flush();
}
