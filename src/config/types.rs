//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::copilot::ClientConfig;
use crate::detect::{CommandDescriptor, DescriptorParseError};

/// Default time to keep a session open after sending a prompt.
pub const DEFAULT_WAIT_MS: u64 = 5000;

/// Settings for a bridge session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Working directory for the CLI, also granted as an allowed directory.
    pub work_dir: Option<PathBuf>,
    /// Handshake timeout override, in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Verbose diagnostics and raw failure detail in error output.
    pub debug: bool,
    /// How long to wait for responses after sending a prompt.
    pub wait_ms: u64,
    /// Model requested from the CLI.
    pub model: Option<String>,
    /// Copilot command to use instead of searching for one, e.g.
    /// `"gh copilot"` or `"/opt/copilot/bin/copilot"`.
    pub command: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            work_dir: None,
            timeout_ms: None,
            debug: false,
            wait_ms: DEFAULT_WAIT_MS,
            model: None,
            command: None,
        }
    }
}

impl BridgeConfig {
    #[must_use]
    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    /// The configured command override, parsed.
    ///
    /// # Errors
    ///
    /// Returns an error if the override is blank or has more than two tokens.
    pub fn command_descriptor(&self) -> Result<Option<CommandDescriptor>, DescriptorParseError> {
        self.command.as_deref().map(str::parse).transpose()
    }

    /// Session options derived from this config.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            work_dir: self.work_dir.clone(),
            model: self.model.clone(),
            timeout: self.timeout_ms.map(Duration::from_millis),
            debug: self.debug,
        }
    }
}
