//! Copilot CLI process management and line-delimited JSON protocol.

mod client;
mod events;
mod process;
mod stream;

pub use client::*;
pub use events::*;
pub use process::*;
pub use stream::*;
