//! Readiness checks for the GitHub CLI, its login, and the Copilot package.
//!
//! Each check is advisory: failures become "not installed" or "not
//! authenticated" results with a reason, never errors.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::runner::{args, program, CommandRunner, RunError, SystemRunner, CHECK_TIMEOUT};
use super::validator::parse_version;

const NPM_PACKAGE: &str = "@github/copilot";
const GH_EXTENSION: &str = "gh-copilot";
const LOGGED_IN_MARKER: &str = "Logged in to github.com";

fn gh_version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"gh version ([0-9.]+)").expect("valid gh version regex"))
}

fn gh_user_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"Logged in to github\.com (?:account|as) ([^\s(]+)")
            .expect("valid gh user regex")
    })
}

fn npm_version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"@github/copilot@([0-9]+\.[0-9]+\.[0-9]+)").expect("valid npm version regex")
    })
}

/// Presence of the GitHub CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPresence {
    pub installed: bool,
    pub version: Option<String>,
    pub error: Option<String>,
}

/// How the user authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Oauth,
    Token,
}

/// GitHub authentication state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    pub authenticated: bool,
    pub user: Option<String>,
    pub method: Option<AuthMethod>,
    pub error: Option<String>,
}

impl AuthState {
    fn denied(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Where the Copilot CLI came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallMethod {
    Npm,
    GhExtension,
}

impl InstallMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::GhExtension => "gh-extension",
        }
    }
}

/// Installation state of the Copilot CLI package or extension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionState {
    pub installed: bool,
    pub version: Option<String>,
    pub method: Option<InstallMethod>,
    pub error: Option<String>,
}

/// Aggregate go/no-go verdict.
///
/// `ready` is derived in [`Readiness::new`] and cannot be set directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Readiness {
    tool: ToolPresence,
    auth: AuthState,
    extension: ExtensionState,
    ready: bool,
}

impl Readiness {
    #[must_use]
    pub fn new(tool: ToolPresence, auth: AuthState, extension: ExtensionState) -> Self {
        let ready = tool.installed && auth.authenticated && extension.installed;
        Self {
            tool,
            auth,
            extension,
            ready,
        }
    }

    #[must_use]
    pub fn tool(&self) -> &ToolPresence {
        &self.tool
    }

    #[must_use]
    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    #[must_use]
    pub fn extension(&self) -> &ExtensionState {
        &self.extension
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready
    }
}

/// Result of [`EnvironmentValidator::validate_access`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessCheck {
    pub valid: bool,
    pub error: Option<String>,
}

/// Runs the environment checks.
#[derive(Debug, Clone)]
pub struct EnvironmentValidator<R = SystemRunner> {
    runner: R,
    timeout: Duration,
}

impl EnvironmentValidator<SystemRunner> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_runner(SystemRunner)
    }
}

impl Default for EnvironmentValidator<SystemRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> EnvironmentValidator<R> {
    #[must_use]
    pub fn with_runner(runner: R) -> Self {
        Self {
            runner,
            timeout: CHECK_TIMEOUT,
        }
    }

    /// Set the per-check timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn gh(&self, gh_args: &[&str]) -> Result<super::CommandOutput, RunError> {
        self.runner
            .run(&program("gh"), &args(gh_args), self.timeout)
            .await
    }

    /// Is `gh` installed, and which version.
    pub async fn check_github_cli(&self) -> ToolPresence {
        match self.gh(&["--version"]).await {
            Ok(output) => {
                let version = gh_version_regex()
                    .captures(&output.stdout)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string());
                tracing::debug!(?version, "GitHub CLI found");
                ToolPresence {
                    installed: true,
                    version,
                    error: None,
                }
            }
            Err(RunError::NotFound { .. }) => ToolPresence {
                installed: false,
                version: None,
                error: Some("GitHub CLI (gh) not found in PATH".to_string()),
            },
            Err(e) => ToolPresence {
                installed: false,
                version: None,
                error: Some(e.to_string()),
            },
        }
    }

    /// Is the user logged in to github.com through `gh`.
    pub async fn check_auth(&self) -> AuthState {
        tracing::debug!("Checking GitHub authentication");

        let cli = self.check_github_cli().await;
        if !cli.installed {
            return AuthState::denied(
                cli.error
                    .unwrap_or_else(|| "GitHub CLI not installed".to_string()),
            );
        }

        match self.gh(&["auth", "status"]).await {
            Ok(output) => {
                let combined = output.combined();
                tracing::debug!(output = %truncate(&combined, 200), "Auth status output");

                if !combined.contains(LOGGED_IN_MARKER) {
                    return AuthState::denied("Not logged in to GitHub");
                }

                let user = gh_user_regex()
                    .captures(&combined)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string());
                tracing::debug!(?user, "Authenticated");
                AuthState {
                    authenticated: true,
                    user,
                    method: Some(AuthMethod::Oauth),
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Error checking auth");
                if e.is_not_found() {
                    return AuthState::denied("GitHub CLI (gh) not found");
                }
                // `gh auth status` exits non-zero when logged out.
                if e.stderr().is_some_and(|s| s.contains("not logged into")) {
                    return AuthState::denied("Not logged in to GitHub");
                }
                AuthState::denied(e.to_string())
            }
        }
    }

    /// Is the Copilot CLI installed, via npm first and the gh extension second.
    pub async fn check_extension(&self) -> ExtensionState {
        tracing::debug!("Checking npm {NPM_PACKAGE}");
        match self
            .runner
            .run(
                &program("npm"),
                &args(&["list", "-g", NPM_PACKAGE, "--depth=0"]),
                self.timeout,
            )
            .await
        {
            Ok(output) if output.stdout.contains(&format!("{NPM_PACKAGE}@")) => {
                let version = npm_version_regex()
                    .captures(&output.stdout)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string());
                tracing::debug!(?version, "npm copilot found");
                return ExtensionState {
                    installed: true,
                    version,
                    method: Some(InstallMethod::Npm),
                    error: None,
                };
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "npm check failed"),
        }

        tracing::debug!("Checking gh copilot extension");
        match self.gh(&["extension", "list"]).await {
            Ok(output) => {
                if let Some(line) = output.stdout.lines().find(|l| l.contains(GH_EXTENSION)) {
                    let version = parse_version(line);
                    tracing::debug!(?version, "gh copilot extension found");
                    return ExtensionState {
                        installed: true,
                        version,
                        method: Some(InstallMethod::GhExtension),
                        error: None,
                    };
                }
                tracing::debug!("Copilot not found in gh extensions");
            }
            Err(e) => tracing::warn!(error = %e, "Error checking gh extension"),
        }

        ExtensionState {
            installed: false,
            error: Some("Copilot CLI not installed".to_string()),
            ..Default::default()
        }
    }

    /// Authenticated and installed, with the first failing reason.
    pub async fn validate_access(&self) -> AccessCheck {
        tracing::debug!("Validating Copilot access");

        let auth = self.check_auth().await;
        if !auth.authenticated {
            return AccessCheck {
                valid: false,
                error: Some(auth.error.unwrap_or_else(|| "Not authenticated".to_string())),
            };
        }

        if !self.check_extension().await.installed {
            return AccessCheck {
                valid: false,
                error: Some("Copilot extension not installed".to_string()),
            };
        }

        AccessCheck {
            valid: true,
            error: None,
        }
    }

    /// Run all three checks concurrently and aggregate them.
    pub async fn check_setup(&self) -> Readiness {
        let (tool, auth, extension) = tokio::join!(
            self.check_github_cli(),
            self.check_auth(),
            self.check_extension()
        );
        Readiness::new(tool, auth, extension)
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    s.char_indices().nth(max_chars).map_or(s, |(idx, _)| &s[..idx])
}
