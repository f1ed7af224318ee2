//! Short-lived, timeout-bounded child process runs.

use std::ffi::{OsStr, OsString};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::FailureSignal;

/// Timeout for locator and validator commands.
pub const RUN_TIMEOUT: Duration = Duration::from_secs(3);

/// Timeout for environment sub-checks.
pub const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Captured output of a command that exited successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[must_use]
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Stdout followed by stderr.
    #[must_use]
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// Why a command did not produce usable output.
#[derive(thiserror::Error, Debug)]
pub enum RunError {
    /// The program does not exist.
    #[error("{program}: command not found")]
    NotFound { program: String },

    /// The program could not be started.
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// The command did not finish in time.
    #[error("{program} timeout after {}ms", .timeout.as_millis())]
    TimedOut { program: String, timeout: Duration },

    /// The program exited with a non-zero (or missing) status.
    #[error("{program} exited with status {}", exit_label(.code))]
    Exited {
        program: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

impl RunError {
    /// Captured stderr, for failures that got far enough to produce any.
    #[must_use]
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::Exited { stderr, .. } => Some(stderr),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<&RunError> for FailureSignal {
    fn from(err: &RunError) -> Self {
        let signal = FailureSignal::from_error(err);
        match err {
            RunError::NotFound { .. } => signal.with_os_code("ENOENT"),
            RunError::Spawn { source, .. } => {
                let mut signal = signal;
                signal.code = FailureSignal::from(source).code;
                signal
            }
            RunError::TimedOut { .. } => signal,
            RunError::Exited { code, stderr, .. } => {
                let signal = signal.with_stderr(stderr.clone());
                match code {
                    Some(code) => signal.with_exit_code(*code),
                    None => signal,
                }
            }
        }
    }
}

/// Runs a program to completion with a timeout.
///
/// Implementations must kill the child when the timeout elapses.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        program: &OsStr,
        args: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, RunError>;
}

/// [`CommandRunner`] backed by real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        program: &OsStr,
        args: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, RunError> {
        let name = program.to_string_lossy().into_owned();
        tracing::debug!(program = %name, ?args, "Running command");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::NotFound {
                    RunError::NotFound {
                        program: name.clone(),
                    }
                } else {
                    RunError::Spawn {
                        program: name.clone(),
                        source,
                    }
                }
            })?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| RunError::TimedOut {
                program: name.clone(),
                timeout,
            })?
            .map_err(|source| RunError::Spawn {
                program: name.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.success() {
            Ok(CommandOutput { stdout, stderr })
        } else {
            Err(RunError::Exited {
                program: name,
                code: output.status.code(),
                stdout,
                stderr,
            })
        }
    }
}

/// Convenience for building owned argument lists.
pub(crate) fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Convenience for probing a plain program name.
pub(crate) fn program(name: &str) -> OsString {
    OsString::from(name)
}
