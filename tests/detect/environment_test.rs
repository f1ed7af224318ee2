//! Tests for GitHub CLI, login, and Copilot installation checks.

use copilot_bridge::detect::{AuthMethod, EnvironmentValidator, InstallMethod};

use super::FakeRunner;

const GH_VERSION: &str = "gh version 2.40.1 (2023-12-13)\nhttps://github.com/cli/cli/releases/tag/v2.40.1\n";
const LOGGED_IN: &str = "github.com\n  ✓ Logged in to github.com account octocat (keyring)\n  - Active account: true\n";
const NPM_LIST: &str = "/usr/local/lib\n└── @github/copilot@0.0.339\n";

fn logged_in_gh() -> FakeRunner {
    FakeRunner::new()
        .ok("gh --version", GH_VERSION)
        .ok_stderr("gh auth status", LOGGED_IN)
}

#[tokio::test]
async fn github_cli_version() {
    let validator = EnvironmentValidator::with_runner(logged_in_gh());
    let tool = validator.check_github_cli().await;

    assert!(tool.installed);
    assert_eq!(tool.version.as_deref(), Some("2.40.1"));
}

#[tokio::test]
async fn github_cli_missing() {
    let validator = EnvironmentValidator::with_runner(FakeRunner::new());
    let tool = validator.check_github_cli().await;

    assert!(!tool.installed);
    assert!(tool.error.unwrap().contains("not found"));
}

#[tokio::test]
async fn logged_in_user_is_parsed() {
    let validator = EnvironmentValidator::with_runner(logged_in_gh());
    let auth = validator.check_auth().await;

    assert!(auth.authenticated);
    assert_eq!(auth.user.as_deref(), Some("octocat"));
    assert_eq!(auth.method, Some(AuthMethod::Oauth));
}

#[tokio::test]
async fn logged_out_exit_is_not_authenticated() {
    let runner = FakeRunner::new().ok("gh --version", GH_VERSION).exits(
        "gh auth status",
        1,
        "You are not logged into any GitHub hosts. Run gh auth login to authenticate.\n",
    );
    let auth = EnvironmentValidator::with_runner(runner).check_auth().await;

    assert!(!auth.authenticated);
    assert_eq!(auth.error.as_deref(), Some("Not logged in to GitHub"));
}

#[tokio::test]
async fn auth_requires_github_cli() {
    let auth = EnvironmentValidator::with_runner(FakeRunner::new())
        .check_auth()
        .await;

    assert!(!auth.authenticated);
    assert!(auth.error.is_some());
}

#[tokio::test]
async fn npm_install_preferred() {
    let runner = logged_in_gh()
        .ok("npm list -g @github/copilot --depth=0", NPM_LIST)
        .ok("gh extension list", "gh copilot\tgithub/gh-copilot\tv1.0.5\n");
    let extension = EnvironmentValidator::with_runner(runner)
        .check_extension()
        .await;

    assert!(extension.installed);
    assert_eq!(extension.method, Some(InstallMethod::Npm));
    assert_eq!(extension.version.as_deref(), Some("0.0.339"));
}

#[tokio::test]
async fn gh_extension_fallback() {
    let runner = logged_in_gh()
        .ok("npm list -g @github/copilot --depth=0", "/usr/local/lib\n└── (empty)\n")
        .ok("gh extension list", "gh copilot\tgithub/gh-copilot\tv1.0.5\n");
    let extension = EnvironmentValidator::with_runner(runner)
        .check_extension()
        .await;

    assert!(extension.installed);
    assert_eq!(extension.method, Some(InstallMethod::GhExtension));
    assert_eq!(extension.version.as_deref(), Some("1.0.5"));
}

#[tokio::test]
async fn extension_missing_everywhere() {
    let runner = logged_in_gh().ok("gh extension list", "gh dash\tdlvhdr/gh-dash\tv4.0.0\n");
    let extension = EnvironmentValidator::with_runner(runner)
        .check_extension()
        .await;

    assert!(!extension.installed);
    assert_eq!(extension.error.as_deref(), Some("Copilot CLI not installed"));
}

#[tokio::test]
async fn setup_ready_only_when_all_pass() {
    let ready = EnvironmentValidator::with_runner(
        logged_in_gh().ok("npm list -g @github/copilot --depth=0", NPM_LIST),
    )
    .check_setup()
    .await;
    assert!(ready.is_ready());

    let not_ready = EnvironmentValidator::with_runner(logged_in_gh())
        .check_setup()
        .await;
    assert!(!not_ready.is_ready());
    assert!(not_ready.tool().installed);
    assert!(not_ready.auth().authenticated);
    assert!(!not_ready.extension().installed);
}

#[tokio::test]
async fn access_reports_first_failure() {
    let unauthenticated = EnvironmentValidator::with_runner(FakeRunner::new())
        .validate_access()
        .await;
    assert!(!unauthenticated.valid);

    let no_extension = EnvironmentValidator::with_runner(logged_in_gh())
        .validate_access()
        .await;
    assert!(!no_extension.valid);
    assert_eq!(
        no_extension.error.as_deref(),
        Some("Copilot extension not installed")
    );

    let valid = EnvironmentValidator::with_runner(
        logged_in_gh().ok("npm list -g @github/copilot --depth=0", NPM_LIST),
    )
    .validate_access()
    .await;
    assert!(valid.valid);
    assert!(valid.error.is_none());
}
