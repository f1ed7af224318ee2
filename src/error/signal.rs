//! Failure signals fed into the classifier.
//!
//! A [`FailureSignal`] is the loosely-typed view of "something went wrong":
//! an OS error code, a child exit status, a message, captured stderr. Every
//! error type in the crate converts into one so the classifier can match on
//! the same fields regardless of where the failure came from.

use std::fmt;
use std::io;

use serde_json::Value;

/// The `code` carried by a failure.
///
/// OS-level failures carry a symbolic errno name (`ENOENT`, `ECONNREFUSED`);
/// child failures carry a numeric exit status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalCode {
    /// Symbolic OS error name.
    Os(String),
    /// Numeric exit status.
    Exit(i32),
}

impl SignalCode {
    /// Returns true if this is the given symbolic OS code.
    #[must_use]
    pub fn is_os(&self, name: &str) -> bool {
        matches!(self, Self::Os(code) if code == name)
    }

    /// Returns true for an exit status of zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        matches!(self, Self::Exit(0))
    }
}

impl fmt::Display for SignalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Os(name) => f.write_str(name),
            Self::Exit(code) => write!(f, "{code}"),
        }
    }
}

/// Unstructured description of a failure, as observed at a boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureSignal {
    /// Human-readable message, if any.
    pub message: Option<String>,
    /// OS error name or exit status.
    pub code: Option<SignalCode>,
    /// Exit status reported separately from `code`.
    pub exit_code: Option<i32>,
    /// Captured standard error of a child process.
    pub stderr: Option<String>,
    /// The failure came from a JSON/syntax parser.
    pub parse_error: bool,
    /// Source chain of the original error, outermost first.
    pub trace: Option<String>,
}

impl FailureSignal {
    /// Create a signal carrying only a message.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Attach an OS error name.
    #[must_use]
    pub fn with_os_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(SignalCode::Os(code.into()));
        self
    }

    /// Attach a numeric code.
    #[must_use]
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(SignalCode::Exit(code));
        self
    }

    /// Attach an exit status.
    #[must_use]
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Attach captured stderr.
    #[must_use]
    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = Some(stderr.into());
        self
    }

    /// Mark the signal as coming from a parser.
    #[must_use]
    pub fn with_parse_error(mut self) -> Self {
        self.parse_error = true;
        self
    }

    /// Build a signal from any error, recording its source chain.
    #[must_use]
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut signal = Self::message(err.to_string());
        signal.trace = error_chain(err);
        signal
    }

    /// Lowercased message, empty when absent.
    pub(crate) fn message_lower(&self) -> String {
        self.message.as_deref().unwrap_or_default().to_lowercase()
    }

    /// Lowercased stderr, empty when absent.
    pub(crate) fn stderr_lower(&self) -> String {
        self.stderr.as_deref().unwrap_or_default().to_lowercase()
    }

    /// Returns true if nothing at all was observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Render the `source()` chain below `err`, one cause per line.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> Option<String> {
    let mut lines = Vec::new();
    let mut current = err.source();
    while let Some(cause) = current {
        lines.push(format!("caused by: {cause}"));
        current = cause.source();
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Symbolic errno name for the io error kinds the classifier cares about.
#[must_use]
pub fn os_code_name(err: &io::Error) -> Option<&'static str> {
    match err.kind() {
        io::ErrorKind::NotFound => Some("ENOENT"),
        io::ErrorKind::PermissionDenied => Some("EACCES"),
        io::ErrorKind::ConnectionRefused => Some("ECONNREFUSED"),
        io::ErrorKind::TimedOut => Some("ETIMEDOUT"),
        io::ErrorKind::BrokenPipe => Some("EPIPE"),
        io::ErrorKind::ConnectionReset => Some("ECONNRESET"),
        _ => None,
    }
}

impl From<&io::Error> for FailureSignal {
    fn from(err: &io::Error) -> Self {
        let mut signal = Self::from_error(err);
        if let Some(code) = os_code_name(err) {
            signal.code = Some(SignalCode::Os(code.to_string()));
        }
        signal
    }
}

impl From<io::Error> for FailureSignal {
    fn from(err: io::Error) -> Self {
        Self::from(&err)
    }
}

impl From<&serde_json::Error> for FailureSignal {
    fn from(err: &serde_json::Error) -> Self {
        let signal = Self::from_error(err);
        if err.is_syntax() || err.is_eof() || err.is_data() {
            signal.with_parse_error()
        } else {
            signal
        }
    }
}

impl From<serde_json::Error> for FailureSignal {
    fn from(err: serde_json::Error) -> Self {
        Self::from(&err)
    }
}

impl From<&str> for FailureSignal {
    fn from(message: &str) -> Self {
        Self::message(message)
    }
}

impl From<String> for FailureSignal {
    fn from(message: String) -> Self {
        Self::message(message)
    }
}

/// Raw JSON objects are read field by field; anything else is an empty signal.
impl From<&Value> for FailureSignal {
    fn from(value: &Value) -> Self {
        let Value::Object(map) = value else {
            return Self::default();
        };

        let code = match map.get("code") {
            Some(Value::String(name)) => Some(SignalCode::Os(name.clone())),
            Some(Value::Number(n)) => n
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .map(SignalCode::Exit),
            _ => None,
        };

        Self {
            message: map
                .get("message")
                .and_then(Value::as_str)
                .map(String::from),
            code,
            exit_code: map
                .get("exitCode")
                .and_then(Value::as_i64)
                .and_then(|n| i32::try_from(n).ok()),
            stderr: map.get("stderr").and_then(Value::as_str).map(String::from),
            parse_error: map.get("name").and_then(Value::as_str) == Some("SyntaxError"),
            trace: map.get("stack").and_then(Value::as_str).map(String::from),
        }
    }
}

impl From<Value> for FailureSignal {
    fn from(value: Value) -> Self {
        Self::from(&value)
    }
}
