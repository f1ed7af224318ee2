//! Multi-strategy discovery of the Copilot executable.
//!
//! Strategies run in order of preference and the first hit wins:
//!
//! 1. `copilot --version` (the npm `@github/copilot` package, full featured)
//! 2. `gh copilot --version` (the `gh` extension, limited)
//! 3. Conventional install locations for the current platform
//! 4. `which`/`where` over a list of candidate names
//!
//! A strategy that errors or times out simply misses.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::runner::{args, program, CommandRunner, SystemRunner, RUN_TIMEOUT};
use super::CommandDescriptor;

/// Canonical command name of the npm package.
pub const COPILOT_COMMAND: &str = "copilot";

/// Host tool that carries the Copilot extension.
pub const GH_COMMAND: &str = "gh";

/// Names tried by the `PATH` search, most capable first.
pub const PATH_CANDIDATES: [&str; 3] = ["copilot", "gh-copilot", "gh"];

/// Platform family, for install-path conventions and the `PATH` search tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Linux and macOS.
    Unix,
    Windows,
    Other,
}

impl Platform {
    #[must_use]
    pub fn current() -> Self {
        match std::env::consts::OS {
            "linux" | "macos" => Self::Unix,
            "windows" => Self::Windows,
            _ => Self::Other,
        }
    }

    /// Tool used to search `PATH`.
    #[must_use]
    pub fn path_search_tool(self) -> &'static str {
        match self {
            Self::Windows => "where",
            _ => "which",
        }
    }
}

/// Conventional install locations, in lookup order.
///
/// Entries containing `*` are kept in the list but never checked.
#[must_use]
pub fn common_install_paths(platform: Platform, home: &Path) -> Vec<PathBuf> {
    match platform {
        Platform::Unix => vec![
            home.join(".nvm/versions/node/*/bin/copilot"),
            PathBuf::from("/usr/local/bin/copilot"),
            PathBuf::from("/usr/bin/copilot"),
            home.join(".local/bin/copilot"),
            PathBuf::from("/opt/homebrew/bin/copilot"),
            home.join(".local/bin/gh-copilot"),
            home.join(".local/share/gh/extensions/gh-copilot/gh-copilot"),
            PathBuf::from("/opt/homebrew/bin/gh-copilot"),
        ],
        Platform::Windows => vec![
            home.join("AppData/Roaming/npm/copilot.cmd"),
            home.join("AppData/Roaming/npm/copilot.exe"),
            home.join("AppData/Local/GitHub CLI/extensions/gh-copilot/gh-copilot.exe"),
            home.join("AppData/Local/Programs/GitHub CLI/extensions/gh-copilot/gh-copilot.exe"),
        ],
        Platform::Other => Vec::new(),
    }
}

/// Finds the Copilot executable.
#[derive(Debug, Clone)]
pub struct BinaryLocator<R = SystemRunner> {
    runner: R,
    platform: Platform,
    install_paths: Vec<PathBuf>,
    timeout: Duration,
}

impl BinaryLocator<SystemRunner> {
    /// Locator for the current platform and user.
    #[must_use]
    pub fn new() -> Self {
        Self::with_runner(SystemRunner)
    }
}

impl Default for BinaryLocator<SystemRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> BinaryLocator<R> {
    /// Locator for the current platform using a custom runner.
    #[must_use]
    pub fn with_runner(runner: R) -> Self {
        let platform = Platform::current();
        let install_paths = dirs::home_dir()
            .map(|home| common_install_paths(platform, &home))
            .unwrap_or_default();
        Self {
            runner,
            platform,
            install_paths,
            timeout: RUN_TIMEOUT,
        }
    }

    /// Override the platform used for the `PATH` search tool.
    #[must_use]
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Replace the conventional install locations.
    #[must_use]
    pub fn install_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.install_paths = paths;
        self
    }

    /// Set the per-command timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn runner(&self) -> &R {
        &self.runner
    }

    #[must_use]
    pub fn run_timeout(&self) -> Duration {
        self.timeout
    }

    /// Run every strategy in order; `None` only when all of them miss.
    pub async fn locate(&self) -> Option<CommandDescriptor> {
        tracing::debug!("Starting Copilot CLI detection");

        if self.find_npm_command().await {
            tracing::debug!("Found npm @github/copilot");
            return Some(CommandDescriptor::named(COPILOT_COMMAND));
        }

        if self.find_gh_extension().await {
            tracing::debug!("Found gh copilot extension (limited features)");
            return Some(CommandDescriptor::composite(GH_COMMAND, COPILOT_COMMAND));
        }

        if let Some(path) = self.find_install_path() {
            tracing::debug!(path = %path.display(), "Found at common install path");
            return Some(CommandDescriptor::path(path));
        }

        if let Some(found) = self.search_path().await {
            tracing::debug!(command = %found, "Found in PATH");
            return Some(found);
        }

        tracing::debug!("Copilot CLI not found");
        None
    }

    async fn find_npm_command(&self) -> bool {
        self.runner
            .run(&program(COPILOT_COMMAND), &args(&["--version"]), self.timeout)
            .await
            .is_ok()
    }

    async fn find_gh_extension(&self) -> bool {
        self.runner
            .run(
                &program(GH_COMMAND),
                &args(&[COPILOT_COMMAND, "--version"]),
                self.timeout,
            )
            .await
            .is_ok()
    }

    fn find_install_path(&self) -> Option<PathBuf> {
        self.install_paths
            .iter()
            .filter(|path| !path.to_string_lossy().contains('*'))
            .find(|path| path.exists())
            .cloned()
    }

    async fn search_path(&self) -> Option<CommandDescriptor> {
        let tool = program(self.platform.path_search_tool());

        for candidate in PATH_CANDIDATES {
            let Ok(output) = self
                .runner
                .run(&tool, &args(&[candidate]), self.timeout)
                .await
            else {
                continue;
            };

            let Some(first) = output.stdout.lines().map(str::trim).find(|l| !l.is_empty())
            else {
                continue;
            };

            let path = PathBuf::from(first);
            if !path.exists() {
                continue;
            }

            // Bare `gh` is only the host; Copilot runs as its subcommand.
            if candidate == GH_COMMAND {
                return Some(
                    CommandDescriptor::composite(GH_COMMAND, COPILOT_COMMAND).with_resolved(path),
                );
            }
            return Some(CommandDescriptor::path(path));
        }

        None
    }
}
