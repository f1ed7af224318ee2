//! Copilot Bridge - drive the GitHub Copilot CLI as a subprocess.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use copilot_bridge::commands::{self, CommandError};
use copilot_bridge::config::{BridgeConfig, ConfigLoader};
use copilot_bridge::detect::{BinaryLocator, EnvironmentValidator};
use copilot_bridge::display;

#[derive(Parser)]
#[command(
    name = "copilot-bridge",
    about = "Drive the GitHub Copilot CLI over line-delimited JSON",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check GitHub CLI, authentication, and Copilot installation.
    Check,
    /// Locate the Copilot CLI and print its version.
    Detect,
    /// Connect to Copilot, optionally send a prompt, and print replies.
    Run {
        /// Prompt to send once connected.
        #[arg(short, long)]
        prompt: Option<String>,
        /// Model to request.
        #[arg(short, long)]
        model: Option<String>,
        /// Working directory for Copilot.
        #[arg(short = 'w', long)]
        work_dir: Option<PathBuf>,
        /// Handshake timeout in milliseconds.
        #[arg(short, long)]
        timeout: Option<u64>,
        /// Time to wait for replies in milliseconds.
        #[arg(long)]
        wait: Option<u64>,
        /// Show debug detail in error output.
        #[arg(short, long)]
        debug: bool,
        /// Copilot command to use instead of searching (e.g. "gh copilot").
        #[arg(long)]
        command: Option<String>,
        /// Config file to use instead of the default search paths.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn debug_from_env() -> bool {
    std::env::var("DEBUG").is_ok_and(|v| v == "1")
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Check => {
            let readiness = commands::check(&EnvironmentValidator::new()).await;
            if readiness.is_ready() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Commands::Detect => {
            let result = commands::detect(&BinaryLocator::new()).await;
            if result.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Commands::Run {
            prompt,
            model,
            work_dir,
            timeout,
            wait,
            debug,
            command,
            config,
        } => {
            let loader = config.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
            tracing::debug!(paths = ?loader.search_paths(), "Config search paths");
            let mut bridge = match loader.load() {
                Ok(bridge) => bridge,
                Err(e) => {
                    eprintln!("Error: {e}");
                    return ExitCode::FAILURE;
                }
            };
            let overrides = Overrides {
                model,
                work_dir,
                timeout,
                wait,
                debug,
                command,
            };
            overrides.apply(&mut bridge);

            let result = commands::run(
                &EnvironmentValidator::new(),
                &BinaryLocator::new(),
                &bridge,
                prompt.as_deref(),
            )
            .await;

            match result {
                Ok(()) => ExitCode::SUCCESS,
                Err(CommandError::Session(error)) => {
                    display::print_error(&error, bridge.debug);
                    ExitCode::FAILURE
                }
                Err(e @ CommandError::InvalidCommand(_)) => {
                    eprintln!("Error: {e}");
                    ExitCode::FAILURE
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Command failed");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

/// Command-line values that take precedence over the config file.
struct Overrides {
    model: Option<String>,
    work_dir: Option<PathBuf>,
    timeout: Option<u64>,
    wait: Option<u64>,
    debug: bool,
    command: Option<String>,
}

impl Overrides {
    fn apply(self, config: &mut BridgeConfig) {
        if self.model.is_some() {
            config.model = self.model;
        }
        if self.work_dir.is_some() {
            config.work_dir = self.work_dir;
        }
        if self.timeout.is_some() {
            config.timeout_ms = self.timeout;
        }
        if let Some(wait) = self.wait {
            config.wait_ms = wait;
        }
        if self.command.is_some() {
            config.command = self.command;
        }
        config.debug = config.debug || self.debug || debug_from_env();
    }
}
