//! Binary validation and version extraction.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use super::runner::{CommandRunner, CommandOutput};
use super::{CommandDescriptor, CommandRef};

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"v?([0-9]+\.[0-9]+\.[0-9]+)").expect("valid version regex"))
}

/// Pull a dotted `X.Y.Z` version out of free-form output.
///
/// Accepts `1.0.0`, `v1.0.0`, `gh-copilot version 1.0.0`.
#[must_use]
pub fn parse_version(output: &str) -> Option<String> {
    version_regex()
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

async fn run_version(
    runner: &impl CommandRunner,
    command: &CommandDescriptor,
    timeout: Duration,
) -> Result<CommandOutput, super::RunError> {
    runner
        .run(command.program(), &command.version_args(), timeout)
        .await
}

/// Check that `command` exists and answers `--version`.
///
/// Never fails: every problem is reported as `false`.
pub async fn validate_binary(
    runner: &impl CommandRunner,
    command: Option<&CommandDescriptor>,
    timeout: Duration,
) -> bool {
    let Some(command) = command else {
        return false;
    };

    tracing::debug!(command = %command, "Validating binary");

    // Bare names are resolved through PATH by the spawn itself.
    if let CommandRef::Path(path) = command.reference() {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Binary not found");
            return false;
        }
    }

    match run_version(runner, command, timeout).await {
        Ok(output) => {
            tracing::debug!(command = %command, version = %output.stdout.trim(), "Binary is valid");
            true
        }
        Err(e) => {
            tracing::warn!(command = %command, error = %e, "Validation failed");
            false
        }
    }
}

/// Version reported by `command`, or `None` if it cannot be determined.
pub async fn extract_version(
    runner: &impl CommandRunner,
    command: &CommandDescriptor,
    timeout: Duration,
) -> Option<String> {
    match run_version(runner, command, timeout).await {
        Ok(output) => {
            let version = parse_version(&output.stdout);
            tracing::debug!(command = %command, ?version, "Detected version");
            version
        }
        Err(e) => {
            tracing::warn!(command = %command, error = %e, "Failed to get version");
            None
        }
    }
}
