//! Priority-ordered failure classification.
//!
//! Signals overlap: almost every child failure carries an exit status, and
//! a connection timeout mentions "timed out". Rules are therefore checked in
//! a fixed order, most specific first, with exit-status matching last.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::signal::{FailureSignal, SignalCode};

/// Closed set of failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Timeout,
    Permission,
    Network,
    Auth,
    NotFound,
    ProcessStart,
    McpProtocol,
    InvalidResponse,
    ProcessExit,
    Unknown,
}

impl ErrorKind {
    /// Whether a caller may reasonably try again after this kind of failure.
    #[must_use]
    pub fn is_recoverable(self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Network | Self::Auth | Self::NotFound | Self::ProcessExit
        )
    }

    /// Stable upper-case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "TIMEOUT",
            Self::Permission => "PERMISSION",
            Self::Network => "NETWORK",
            Self::Auth => "AUTH",
            Self::NotFound => "NOT_FOUND",
            Self::ProcessStart => "PROCESS_START",
            Self::McpProtocol => "MCP_PROTOCOL",
            Self::InvalidResponse => "INVALID_RESPONSE",
            Self::ProcessExit => "PROCESS_EXIT",
            Self::Unknown => "UNKNOWN",
        }
    }

    fn hint(self) -> &'static str {
        match self {
            Self::Timeout => "The command took too long to execute. Try increasing the timeout or check network.",
            Self::Permission => "Insufficient permissions to execute the command.",
            Self::Network => "Please check your internet connection and try again.",
            Self::Auth => "Please run \"gh auth login\" to authenticate with GitHub.",
            Self::NotFound => "Please install GitHub Copilot CLI:\n  npm install -g @github/copilot",
            Self::ProcessStart => "The Copilot CLI process could not be started. Check if the executable is valid.",
            Self::McpProtocol => "Failed to communicate with Copilot via MCP protocol. Check message format.",
            Self::InvalidResponse => "The response from Copilot could not be parsed.",
            Self::ProcessExit => "The Copilot process terminated. This might be a bug in Copilot CLI.",
            Self::Unknown => "An unexpected error occurred. Please check the logs for details.",
        }
    }

    fn recovery_action(self) -> &'static str {
        match self {
            Self::Timeout => "Retry with longer timeout",
            Self::Permission => "Check file permissions or run with appropriate access",
            Self::Network => "Retry after checking network connectivity",
            Self::Auth => "Run: gh auth login",
            Self::NotFound => "Install: npm install -g @github/copilot",
            Self::ProcessStart => "Reinstall Copilot CLI",
            Self::McpProtocol => "Update Copilot CLI to latest version",
            Self::InvalidResponse => "Update Copilot CLI",
            Self::ProcessExit => "Restart Copilot",
            Self::Unknown => "Check logs and report issue",
        }
    }

    fn summary(self) -> &'static str {
        match self {
            Self::Timeout => "Command execution timeout",
            Self::Permission => "Permission denied",
            Self::Network => "Network connection failed",
            Self::Auth => "GitHub authentication failed",
            Self::NotFound => "Copilot CLI not found",
            Self::ProcessStart => "Failed to start Copilot process",
            Self::McpProtocol => "MCP protocol communication error",
            Self::InvalidResponse => "Invalid response format from Copilot",
            Self::ProcessExit => "Copilot process exited unexpectedly",
            Self::Unknown => "An unknown error occurred",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure tagged with its kind and the advice that goes with it.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    pub hint: Option<String>,
    pub recoverable: bool,
    pub recovery_action: Option<String>,
    /// The signal this error was classified from.
    pub cause: Option<FailureSignal>,
}

impl ClassifiedError {
    /// Build an error of `kind` from its fixed templates.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            hint: Some(kind.hint().to_string()),
            recoverable: kind.is_recoverable(),
            recovery_action: Some(kind.recovery_action().to_string()),
            cause: None,
        }
    }

    #[must_use]
    fn with_cause(mut self, signal: FailureSignal) -> Self {
        if !signal.is_empty() {
            self.cause = Some(signal);
        }
        self
    }
}

const NETWORK_CODES: [&str; 3] = ["ECONNREFUSED", "ENOTFOUND", "ETIMEDOUT"];

fn is_timeout(signal: &FailureSignal) -> bool {
    // A connect-level ETIMEDOUT is a network failure, not a slow command.
    signal.message_lower().contains("timeout")
        && !signal.code.as_ref().is_some_and(|c| c.is_os("ETIMEDOUT"))
}

fn is_permission(signal: &FailureSignal) -> bool {
    signal
        .code
        .as_ref()
        .is_some_and(|c| c.is_os("EACCES") || c.is_os("EPERM"))
        || signal.message_lower().contains("permission denied")
}

fn is_network(signal: &FailureSignal) -> bool {
    let message = signal.message_lower();
    message.contains("network")
        || NETWORK_CODES
            .iter()
            .any(|code| message.contains(&code.to_lowercase()))
        || signal
            .code
            .as_ref()
            .is_some_and(|c| NETWORK_CODES.iter().any(|code| c.is_os(code)))
}

fn is_auth(signal: &FailureSignal) -> bool {
    let message = signal.message_lower();
    let stderr = signal.stderr_lower();
    message.contains("not logged in")
        || message.contains("authentication failed")
        || message.contains("unauthorized")
        || stderr.contains("not logged in")
        || stderr.contains("token")
        || stderr.contains("gh auth login")
}

fn is_not_found(signal: &FailureSignal) -> bool {
    let message = signal.message_lower();
    signal.code.as_ref().is_some_and(|c| c.is_os("ENOENT"))
        || message.contains("not found")
        || message.contains("command not found")
}

fn is_process_start(signal: &FailureSignal) -> bool {
    let message = signal.message_lower();
    message.contains("spawn") || message.contains("failed to start")
}

fn is_mcp_protocol(signal: &FailureSignal) -> bool {
    let message = signal.message_lower();
    message.contains("mcp") || message.contains("protocol") || message.contains("invalid message")
}

fn is_invalid_response(signal: &FailureSignal) -> bool {
    let message = signal.message_lower();
    signal.parse_error
        || message.contains("json")
        || message.contains("parse")
        || message.contains("invalid response")
}

/// The code reported for an unexpected exit, if the signal carries one.
fn exit_code(signal: &FailureSignal) -> Option<SignalCode> {
    match &signal.code {
        Some(code) if !code.is_zero() => Some(code.clone()),
        _ => signal
            .exit_code
            .filter(|code| *code != 0)
            .map(SignalCode::Exit),
    }
}

/// Classify a failure signal.
///
/// Never panics; anything that matches no rule is [`ErrorKind::Unknown`].
#[must_use]
pub fn classify(signal: impl Into<FailureSignal>) -> ClassifiedError {
    let signal = signal.into();
    tracing::debug!(message = ?signal.message, code = ?signal.code, "Classifying failure");

    let kind = if is_timeout(&signal) {
        ErrorKind::Timeout
    } else if is_permission(&signal) {
        ErrorKind::Permission
    } else if is_network(&signal) {
        ErrorKind::Network
    } else if is_auth(&signal) {
        ErrorKind::Auth
    } else if is_not_found(&signal) {
        ErrorKind::NotFound
    } else if is_process_start(&signal) {
        ErrorKind::ProcessStart
    } else if is_mcp_protocol(&signal) {
        ErrorKind::McpProtocol
    } else if is_invalid_response(&signal) {
        ErrorKind::InvalidResponse
    } else if let Some(code) = exit_code(&signal) {
        let message = format!("{} (code: {code})", ErrorKind::ProcessExit.summary());
        return ClassifiedError::new(ErrorKind::ProcessExit, message).with_cause(signal);
    } else {
        let message = signal
            .message
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| ErrorKind::Unknown.summary().to_string());
        return ClassifiedError::new(ErrorKind::Unknown, message).with_cause(signal);
    };

    ClassifiedError::new(kind, kind.summary()).with_cause(signal)
}
