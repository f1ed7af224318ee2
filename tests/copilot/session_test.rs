//! Tests for the run command's session flow.

use copilot_bridge::commands::{run, run_session, CommandError};
use copilot_bridge::config::BridgeConfig;
use copilot_bridge::detect::{BinaryLocator, DescriptorParseError, EnvironmentValidator};
use copilot_bridge::error::ErrorKind;

use crate::detect::FakeRunner;

use super::{script, ECHO, SILENT};

fn quick_config() -> BridgeConfig {
    BridgeConfig {
        wait_ms: 200,
        ..BridgeConfig::default()
    }
}

#[tokio::test]
async fn prompt_session_completes() {
    let (_dir, command) = script(ECHO);
    run_session(command, &quick_config(), Some("hello"))
        .await
        .unwrap();
}

#[tokio::test]
async fn connection_test_without_prompt() {
    let (_dir, command) = script(ECHO);
    run_session(command, &quick_config(), None).await.unwrap();
}

#[tokio::test]
async fn handshake_timeout_is_classified() {
    let (_dir, command) = script(SILENT);
    let config = BridgeConfig {
        timeout_ms: Some(200),
        ..quick_config()
    };

    let err = run_session(command, &config, None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Timeout);
    assert!(err.recoverable);
}

#[tokio::test]
async fn missing_binary_is_not_found() {
    let command = copilot_bridge::detect::CommandDescriptor::named("definitely-not-a-real-binary-xyz");
    let err = run_session(command, &quick_config(), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

const MISSING_CLI: &str = "definitely-not-a-real-copilot-xyz";

fn ready_environment() -> EnvironmentValidator<FakeRunner> {
    EnvironmentValidator::with_runner(
        FakeRunner::new()
            .ok("gh --version", "gh version 2.40.1 (2023-12-13)\n")
            .ok_stderr(
                "gh auth status",
                "github.com\n  Logged in to github.com account octocat (keyring)\n",
            )
            .ok(
                "npm list -g @github/copilot --depth=0",
                "/usr/local/lib\n└── @github/copilot@0.0.339\n",
            ),
    )
}

fn with_command(command: &str) -> BridgeConfig {
    BridgeConfig {
        command: Some(command.to_string()),
        ..quick_config()
    }
}

#[tokio::test]
async fn command_override_skips_search_but_is_validated() {
    let locator = BinaryLocator::with_runner(
        FakeRunner::new().ok(&format!("{MISSING_CLI} --version"), "1.0.0\n"),
    );

    let err = run(&ready_environment(), &locator, &with_command(MISSING_CLI), None)
        .await
        .unwrap_err();

    // Validation passed, so the session tried to spawn the override itself.
    match err {
        CommandError::Session(error) => assert_eq!(error.kind, ErrorKind::NotFound),
        other => panic!("Expected session failure, got {other:?}"),
    }
    let calls = locator.runner().calls();
    assert!(calls.iter().all(|c| c.starts_with(MISSING_CLI)), "calls: {calls:?}");
    assert!(!calls.iter().any(|c| c.starts_with("npm") || c.starts_with("which")));
}

#[tokio::test]
async fn command_override_that_fails_validation_stops_run() {
    let locator = BinaryLocator::with_runner(FakeRunner::new().exits(
        "gh copilot --version",
        1,
        "unknown command \"copilot\" for \"gh\"",
    ));

    let err = run(&ready_environment(), &locator, &with_command("gh copilot"), None)
        .await
        .unwrap_err();

    match err {
        CommandError::Detection(reason) => {
            assert_eq!(reason.as_deref(), Some("Copilot CLI found but validation failed"));
        }
        other => panic!("Expected detection failure, got {other:?}"),
    }
    assert_eq!(locator.runner().calls(), vec!["gh copilot --version"]);
}

#[tokio::test]
async fn malformed_command_override_is_rejected() {
    let locator = BinaryLocator::with_runner(FakeRunner::new());

    let err = run(&ready_environment(), &locator, &with_command("gh copilot chat"), None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CommandError::InvalidCommand(DescriptorParseError::TooManyTokens(_))
    ));
    assert!(locator.runner().calls().is_empty());
}
