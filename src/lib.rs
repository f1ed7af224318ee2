//! Copilot Bridge - drive the GitHub Copilot CLI as a subprocess.

pub mod commands;
pub mod config;
pub mod copilot;
pub mod detect;
pub mod display;
pub mod error;
