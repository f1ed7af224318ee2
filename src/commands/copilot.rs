//! Copilot command handlers.
//!
//! `run` gates on environment readiness, detects the executable (or
//! validates the configured override), opens a session, optionally sends
//! one prompt, waits for replies, then disconnects.

use crate::config::BridgeConfig;
use crate::copilot::CopilotClient;
use crate::detect::{
    detect_copilot, verify_command, BinaryLocator, CommandDescriptor, CommandRunner,
    DescriptorParseError, DetectionResult, EnvironmentValidator, Readiness,
};
use crate::display;
use crate::error::ClassifiedError;

/// Errors that end a command with a failure exit status.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// One or more environment checks failed.
    #[error("Copilot setup incomplete")]
    NotReady(Box<Readiness>),
    /// The configured command override could not be parsed.
    #[error("Invalid Copilot command: {0}")]
    InvalidCommand(#[from] DescriptorParseError),
    /// No usable executable was found.
    #[error("Failed to detect Copilot CLI: {}", .0.as_deref().unwrap_or("unknown reason"))]
    Detection(Option<String>),
    /// The session failed.
    #[error(transparent)]
    Session(#[from] ClassifiedError),
}

/// Run the environment checks and print the readiness report.
pub async fn check<R: CommandRunner>(validator: &EnvironmentValidator<R>) -> Readiness {
    display::print_step("Checking Copilot setup...");
    let readiness = validator.check_setup().await;
    display::print_readiness(&readiness);
    readiness
}

/// Detect the Copilot executable and print where it was found.
pub async fn detect<R: CommandRunner>(locator: &BinaryLocator<R>) -> DetectionResult {
    display::print_step("Detecting Copilot CLI...");
    let result = detect_copilot(locator).await;
    display::print_detection(&result);
    result
}

/// Validate a configured command instead of searching for one.
pub async fn verify<R: CommandRunner>(
    locator: &BinaryLocator<R>,
    command: CommandDescriptor,
) -> DetectionResult {
    display::print_step(&format!("Validating configured command `{command}`..."));
    let result = verify_command(locator, command).await;
    display::print_detection(&result);
    result
}

/// Full check, detect, and session flow.
///
/// When `config.command` is set the locator does not search; the override
/// is only validated.
///
/// # Errors
///
/// Returns `CommandError::NotReady`, `CommandError::InvalidCommand` or
/// `CommandError::Detection` when a gate fails (the report has already been
/// printed), and `CommandError::Session` for classified session failures.
pub async fn run<R: CommandRunner, L: CommandRunner>(
    validator: &EnvironmentValidator<R>,
    locator: &BinaryLocator<L>,
    config: &BridgeConfig,
    prompt: Option<&str>,
) -> Result<(), CommandError> {
    let readiness = check(validator).await;
    if !readiness.is_ready() {
        return Err(CommandError::NotReady(Box::new(readiness)));
    }

    let detection = match config.command_descriptor()? {
        Some(command) => verify(locator, command).await,
        None => detect(locator).await,
    };
    let command = match detection {
        DetectionResult {
            success: true,
            command: Some(command),
            ..
        } => command,
        other => return Err(CommandError::Detection(other.error)),
    };

    run_session(command, config, prompt).await?;
    Ok(())
}

/// Talk to an already-detected executable.
///
/// The session is always disconnected before returning, including when the
/// handshake or the prompt write fails.
///
/// # Errors
///
/// Returns the classified connect or send failure.
pub async fn run_session(
    command: CommandDescriptor,
    config: &BridgeConfig,
    prompt: Option<&str>,
) -> Result<(), ClassifiedError> {
    display::print_step("Starting Copilot session...");

    let debug = config.debug;
    let mut client = CopilotClient::new(command, config.client_config());
    client.on_message(display::print_message);
    client.on_error(move |error| display::print_error(error, debug));
    client.on_exit(display::print_exit);

    let result = exchange(&mut client, config, prompt).await;

    display::print_step("Disconnecting...");
    client.disconnect().await;
    if result.is_ok() {
        display::print_ok("Disconnected successfully");
    }
    result
}

async fn exchange(
    client: &mut CopilotClient,
    config: &BridgeConfig,
    prompt: Option<&str>,
) -> Result<(), ClassifiedError> {
    client.connect().await?;
    display::print_ok("Connected to Copilot");

    match prompt {
        Some(prompt) => {
            display::print_step("Sending prompt...");
            client.send_prompt(prompt).await?;
        }
        None => {
            display::print_ok("Copilot is ready. Connection test successful.");
            display::print_detail("Hint", "Use -p \"your prompt\" to send a message.");
        }
    }

    tokio::time::sleep(config.wait()).await;
    Ok(())
}
