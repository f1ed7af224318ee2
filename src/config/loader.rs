//! Configuration file loader.
//!
//! Search order, first existing file wins:
//!
//! 1. the file named by `COPILOT_BRIDGE_CONFIG`
//! 2. `.copilot-bridge.toml` in the current directory or the nearest ancestor
//! 3. `<config_dir>/copilot-bridge/config.toml`

use std::path::{Path, PathBuf};

use super::BridgeConfig;

/// Project-local config file name.
pub const LOCAL_CONFIG_FILE: &str = ".copilot-bridge.toml";

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "COPILOT_BRIDGE_CONFIG";

/// Configuration loader that searches multiple locations.
#[derive(Debug)]
pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Loader over the environment, project and user locations.
    #[must_use]
    pub fn new() -> Self {
        let env_path = std::env::var_os(CONFIG_ENV_VAR)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let cwd = std::env::current_dir().ok();
        Self {
            search_paths: default_search_paths(env_path, cwd.as_deref(), dirs::config_dir()),
        }
    }

    /// Loader for exactly one file, as given by `--config`.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            search_paths: vec![path],
        }
    }

    /// Load the first config file that exists, or defaults when none does.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen file cannot be read or parsed. Later
    /// candidates are not tried.
    pub fn load(&self) -> Result<BridgeConfig, ConfigError> {
        for path in &self.search_paths {
            if !path.is_file() {
                tracing::trace!(path = %path.display(), "No config file here");
                continue;
            }
            tracing::debug!(path = %path.display(), "Loading config file");
            return read_config(path);
        }

        tracing::debug!(searched = self.search_paths.len(), "No config file found, using defaults");
        Ok(BridgeConfig::default())
    }

    /// Candidate files in priority order.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the ordered candidate list.
///
/// Every ancestor of `cwd` contributes a `.copilot-bridge.toml` candidate,
/// nearest first, so a file at the project root applies to its
/// subdirectories.
fn default_search_paths(
    env_path: Option<PathBuf>,
    cwd: Option<&Path>,
    config_dir: Option<PathBuf>,
) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = env_path.into_iter().collect();

    match cwd {
        Some(cwd) => paths.extend(cwd.ancestors().map(|dir| dir.join(LOCAL_CONFIG_FILE))),
        None => paths.push(PathBuf::from(LOCAL_CONFIG_FILE)),
    }

    if let Some(config_dir) = config_dir {
        paths.push(config_dir.join("copilot-bridge").join("config.toml"));
    }
    paths
}

fn read_config(path: &Path) -> Result<BridgeConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::ParseError {
        path: path.to_path_buf(),
        source,
    })
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}
