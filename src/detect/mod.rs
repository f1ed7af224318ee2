//! Copilot CLI discovery, validation, and environment readiness.

mod descriptor;
mod environment;
mod locator;
mod runner;
mod validator;

pub use descriptor::*;
pub use environment::*;
pub use locator::*;
pub use runner::{CommandRunner, RunError, CommandOutput, SystemRunner, CHECK_TIMEOUT, RUN_TIMEOUT};
pub use validator::*;

use serde::Serialize;

/// Install suggestion shown when no executable can be found.
pub const INSTALL_SUGGESTION: &str =
    "Copilot CLI not found. Please install it with: npm install -g @github/copilot (or: gh extension install github/gh-copilot)";

/// Extra facts gathered about a detected executable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectionDetails {
    pub version: Option<String>,
    /// The command as it will be invoked.
    pub command: String,
}

/// Outcome of [`detect_copilot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionResult {
    pub success: bool,
    pub command: Option<CommandDescriptor>,
    pub error: Option<String>,
    pub details: Option<DetectionDetails>,
}

impl DetectionResult {
    fn found(command: CommandDescriptor, version: Option<String>) -> Self {
        let details = DetectionDetails {
            version,
            command: command.to_string(),
        };
        Self {
            success: true,
            command: Some(command),
            error: None,
            details: Some(details),
        }
    }

    fn not_found() -> Self {
        Self {
            success: false,
            command: None,
            error: Some(INSTALL_SUGGESTION.to_string()),
            details: None,
        }
    }

    fn invalid(command: CommandDescriptor) -> Self {
        Self {
            success: false,
            command: Some(command),
            error: Some("Copilot CLI found but validation failed".to_string()),
            details: None,
        }
    }

    /// Version reported during detection, if any.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.details.as_ref().and_then(|d| d.version.as_deref())
    }
}

/// Locate, validate, and version the Copilot executable.
pub async fn detect_copilot<R: CommandRunner>(locator: &BinaryLocator<R>) -> DetectionResult {
    let Some(command) = locator.locate().await else {
        return DetectionResult::not_found();
    };
    verify_command(locator, command).await
}

/// Validate and version a command chosen without searching, such as a
/// user-supplied override.
pub async fn verify_command<R: CommandRunner>(
    locator: &BinaryLocator<R>,
    command: CommandDescriptor,
) -> DetectionResult {
    let runner = locator.runner();
    let timeout = locator.run_timeout();

    if !validate_binary(runner, Some(&command), timeout).await {
        return DetectionResult::invalid(command);
    }

    let version = extract_version(runner, &command, timeout).await;
    DetectionResult::found(command, version)
}
