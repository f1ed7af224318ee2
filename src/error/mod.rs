//! Failure classification, recovery, and rendering.

mod classify;
mod format;
mod recovery;
mod signal;

pub use classify::*;
pub use format::*;
pub use recovery::*;
pub use signal::*;
