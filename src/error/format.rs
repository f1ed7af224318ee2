//! Plain-text rendering of classified errors.

use super::ClassifiedError;

/// Render `error` as the lines shown to a user.
///
/// The cause detail is only included when `debug` is set.
#[must_use]
pub fn format_error(error: &ClassifiedError, debug: bool) -> String {
    let mut lines = vec![format!("[ERROR] {}", error.message)];

    if let Some(hint) = &error.hint {
        lines.push(format!("[HINT] {hint}"));
    }

    if let Some(action) = &error.recovery_action {
        lines.push(format!("[FIX] {action}"));
    }

    if debug {
        if let Some(cause) = &error.cause {
            let detail = cause
                .message
                .as_deref()
                .map_or_else(|| format!("{cause:?}"), String::from);
            lines.push(format!("\n[DEBUG] {detail}"));
            if let Some(trace) = &cause.trace {
                lines.push(trace.clone());
            }
        }
    }

    lines.join("\n")
}
