//! Copilot CLI process spawning and control.
//!
//! This module provides a builder for the Copilot command line, plus a
//! handle over the running child that supports graceful termination.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

use crate::detect::CommandDescriptor;
use crate::error::FailureSignal;

/// Environment variable asking the CLI for JSON output.
pub const OUTPUT_FORMAT_ENV: &str = "COPILOT_OUTPUT_FORMAT";

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The binary was not found.
    #[error("Copilot binary not found")]
    NotFound,
    /// Permission denied when spawning.
    #[error("Permission denied")]
    PermissionDenied,
    /// A stdio pipe was not created.
    #[error("Failed to create stdio streams")]
    MissingPipe,
    /// Other I/O error.
    #[error("Failed to spawn Copilot process: {0}")]
    Io(#[from] std::io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    fn from_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound,
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            _ => Self::Io(err),
        }
    }
}

impl From<&SpawnError> for FailureSignal {
    fn from(err: &SpawnError) -> Self {
        let signal = FailureSignal::from_error(err);
        match err {
            SpawnError::NotFound => signal.with_os_code("ENOENT"),
            SpawnError::PermissionDenied => signal.with_os_code("EACCES"),
            SpawnError::MissingPipe => signal,
            SpawnError::Io(io) => Self {
                code: FailureSignal::from(io).code,
                ..signal
            },
        }
    }
}

/// Builder for the Copilot CLI command line.
#[derive(Debug, Clone)]
pub struct CopilotProcessBuilder {
    command: CommandDescriptor,
    working_dir: Option<PathBuf>,
    model: Option<String>,
}

impl CopilotProcessBuilder {
    /// Create a builder for the given executable.
    #[must_use]
    pub fn new(command: CommandDescriptor) -> Self {
        Self {
            command,
            working_dir: None,
            model: None,
        }
    }

    /// Set the working directory, also granted to the CLI for file access.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Request a specific model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn command(&self) -> &CommandDescriptor {
        &self.command
    }

    /// Build the command-line arguments.
    ///
    /// The `gh copilot` extension only understands `copilot chat`; the
    /// standalone CLI takes the non-interactive flags.
    #[must_use]
    pub fn build_args(&self) -> Vec<String> {
        if self.command.is_composite() {
            let mut args = self.command.leading_args();
            args.push("chat".to_string());
            return args;
        }

        let mut args = vec![
            "--non-interactive".to_string(),
            "--allow-all-tools".to_string(),
        ];

        if let Some(dir) = &self.working_dir {
            args.push("--add-dir".to_string());
            args.push(dir.to_string_lossy().into_owned());
        }

        if let Some(model) = &self.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }

        args
    }
}

/// A running Copilot CLI process.
#[derive(Debug)]
pub struct CopilotProcess {
    child: Child,
}

impl CopilotProcess {
    /// Spawn the process with all three stdio streams piped.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    pub fn spawn(builder: &CopilotProcessBuilder) -> Result<Self, SpawnError> {
        let args = builder.build_args();
        tracing::debug!(command = %builder.command, ?args, "Starting Copilot process");

        let mut cmd = Command::new(builder.command.program());
        cmd.args(&args)
            .env(OUTPUT_FORMAT_ENV, "json")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref dir) = builder.working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(SpawnError::from_io)?;

        Ok(Self { child })
    }

    /// Take ownership of the stdin handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.child.stdin.take()
    }

    /// Take ownership of the stdout handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take ownership of the stderr handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Get the process ID, if still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the process to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting fails.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Forcefully kill the process.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill signal cannot be sent.
    pub async fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill().await
    }

    /// Attempt graceful termination with a timeout.
    ///
    /// On Unix, sends SIGTERM first, then SIGKILL after the timeout.
    /// On other platforms, falls back to immediate kill.
    ///
    /// # Errors
    ///
    /// Returns an error if termination fails.
    pub async fn graceful_terminate(&mut self, timeout: Duration) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            self.graceful_terminate_unix(timeout).await
        }

        #[cfg(not(unix))]
        {
            let _ = timeout;
            self.kill().await
        }
    }

    #[cfg(unix)]
    async fn graceful_terminate_unix(&mut self, timeout: Duration) -> std::io::Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.id() else {
            // Already reaped.
            return Ok(());
        };

        let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
        let _ = kill(nix_pid, Signal::SIGTERM);

        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::warn!(pid, "Force killing Copilot process");
                self.child.kill().await
            }
        }
    }
}
