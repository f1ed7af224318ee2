//! Line framing for Copilot CLI stdout.

use crate::copilot::CopilotMessage;

/// Error type for parsing a single line.
#[derive(thiserror::Error, Debug)]
pub enum StreamError {
    #[error("Failed to parse JSON message: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Message line is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// Parse one line of output into a message.
///
/// # Errors
///
/// Returns `StreamError::ParseError` if the line is not a JSON object with
/// a string `type` field.
pub fn parse_message(line: &str) -> Result<CopilotMessage, StreamError> {
    Ok(serde_json::from_str(line)?)
}

/// Accumulates raw output bytes and yields complete newline-terminated lines.
///
/// Bytes after the last newline stay buffered until more input arrives.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    pending: Vec<u8>,
}

impl FrameBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed, without newlines.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(chunk);

        let Some(last_newline) = self.pending.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };

        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        complete[..last_newline]
            .split(|&b| b == b'\n')
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line).to_vec())
            .collect()
    }

    /// Append a chunk and parse each completed line.
    ///
    /// Blank lines are skipped. Lines that fail to parse are logged and
    /// dropped; they never interrupt the stream.
    pub fn push_messages(&mut self, chunk: &[u8]) -> Vec<CopilotMessage> {
        self.push(chunk)
            .into_iter()
            .filter_map(|line| decode_line(&line))
            .collect()
    }

    /// Bytes received after the last complete line.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Whether there is a partial line buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

fn decode_line(line: &[u8]) -> Option<CopilotMessage> {
    let text = match std::str::from_utf8(line) {
        Ok(text) => text.trim(),
        Err(e) => {
            tracing::warn!(error = %StreamError::from(e), "Dropping message line");
            return None;
        }
    };

    if text.is_empty() {
        return None;
    }

    match parse_message(text) {
        Ok(message) => {
            tracing::debug!(kind = message.kind(), "Received message");
            Some(message)
        }
        Err(e) => {
            let preview: String = text.chars().take(100).collect();
            tracing::warn!(error = %e, line = %preview, "Failed to parse message");
            None
        }
    }
}
