//! CLI command handlers.

mod copilot;

pub use copilot::*;
