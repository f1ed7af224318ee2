//! Message types exchanged with the Copilot CLI over stdio.
//!
//! Every message is one JSON object per line with a `type` tag. Inbound
//! messages may also carry an `id` and a millisecond `timestamp`.
//!
//! Inbound decoding is lenient: any object with a string `type` becomes a
//! [`CopilotMessage`]. Types this crate does not model, and modelled types
//! whose fields do not decode, are kept as [`MessagePayload::Unknown`] with
//! their fields intact.

use std::fmt;

use serde::de::{self, Deserializer};
use serde::ser::{self, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Message types decoded into dedicated payload variants.
const KNOWN_TYPES: [&str; 6] = [
    "ready",
    "assistant_message",
    "file_edit",
    "command_execution",
    "thinking",
    "error",
];

/// Treat an explicit `null` like a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A file touched by a `file_edit` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEdit {
    pub path: String,
    #[serde(default, deserialize_with = "nullable")]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<FileOperation>,
}

/// What happened to an edited file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOperation {
    Create,
    Update,
    Delete,
}

/// Type-specific part of an inbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePayload {
    /// The CLI finished initializing.
    Ready,
    /// Assistant reply text.
    AssistantMessage {
        #[serde(default, deserialize_with = "nullable")]
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    /// A batch of file edits.
    FileEdit {
        #[serde(default, deserialize_with = "nullable")]
        files: Vec<FileEdit>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        success: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
    },
    /// A shell command the assistant ran.
    CommandExecution {
        #[serde(default, deserialize_with = "nullable")]
        command: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<String>,
        #[serde(
            default,
            rename = "exitCode",
            skip_serializing_if = "Option::is_none"
        )]
        exit_code: Option<i64>,
    },
    /// Intermediate reasoning text.
    Thinking {
        #[serde(default, deserialize_with = "nullable")]
        text: String,
    },
    /// An error reported by the CLI.
    Error {
        #[serde(default, deserialize_with = "nullable")]
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Any other message, with its wire type and remaining fields.
    #[serde(skip)]
    Unknown {
        kind: String,
        fields: Map<String, Value>,
    },
}

/// Message id, which the CLI may send as a string or a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Text(String),
    Number(Number),
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(number) => write!(f, "{number}"),
        }
    }
}

/// An inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct CopilotMessage {
    pub id: Option<MessageId>,
    /// Milliseconds since the epoch, integral or not.
    pub timestamp: Option<Number>,
    pub payload: MessagePayload,
}

impl CopilotMessage {
    /// Wrap a payload without id or timestamp.
    #[must_use]
    pub fn new(payload: MessagePayload) -> Self {
        Self {
            id: None,
            timestamp: None,
            payload,
        }
    }

    /// Decode a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is not an object with a string `type`.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let Value::Object(mut fields) = value else {
            return Err(de::Error::custom("message is not a JSON object"));
        };
        let Some(Value::String(kind)) = fields.remove("type") else {
            return Err(de::Error::custom("message has no string `type` field"));
        };

        let id = fields
            .remove("id")
            .and_then(|v| serde_json::from_value::<MessageId>(v).ok());
        let timestamp = match fields.remove("timestamp") {
            Some(Value::Number(n)) => Some(n),
            _ => None,
        };

        let payload = if KNOWN_TYPES.contains(&kind.as_str()) {
            let mut tagged = fields.clone();
            tagged.insert("type".to_string(), Value::String(kind.clone()));
            match serde_json::from_value(Value::Object(tagged)) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::debug!(kind = %kind, error = %e, "Keeping message fields undecoded");
                    MessagePayload::Unknown { kind, fields }
                }
            }
        } else {
            MessagePayload::Unknown { kind, fields }
        };

        Ok(Self {
            id,
            timestamp,
            payload,
        })
    }

    /// Encode as a flat JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error if a payload field cannot be serialized.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        let mut object = match &self.payload {
            MessagePayload::Unknown { kind, fields } => {
                let mut object = fields.clone();
                object.insert("type".to_string(), Value::String(kind.clone()));
                object
            }
            known => match serde_json::to_value(known)? {
                Value::Object(object) => object,
                _ => Map::new(),
            },
        };
        if let Some(id) = &self.id {
            object.insert("id".to_string(), serde_json::to_value(id)?);
        }
        if let Some(timestamp) = &self.timestamp {
            object.insert("timestamp".to_string(), Value::Number(timestamp.clone()));
        }
        Ok(Value::Object(object))
    }

    /// Returns true for the readiness signal.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self.payload, MessagePayload::Ready)
    }

    /// Wire name of the message type.
    #[must_use]
    pub fn kind(&self) -> &str {
        match &self.payload {
            MessagePayload::Ready => "ready",
            MessagePayload::AssistantMessage { .. } => "assistant_message",
            MessagePayload::FileEdit { .. } => "file_edit",
            MessagePayload::CommandExecution { .. } => "command_execution",
            MessagePayload::Thinking { .. } => "thinking",
            MessagePayload::Error { .. } => "error",
            MessagePayload::Unknown { kind, .. } => kind.as_str(),
        }
    }

    /// Timestamp truncated to whole milliseconds.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn timestamp_millis(&self) -> Option<i64> {
        let timestamp = self.timestamp.as_ref()?;
        timestamp
            .as_i64()
            .or_else(|| timestamp.as_f64().map(|ms| ms as i64))
    }

    /// Display text carried by the message, if any.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            MessagePayload::AssistantMessage { text, content } => {
                content
                    .as_deref()
                    .filter(|_| text.is_empty())
                    .or(Some(text.as_str()))
            }
            MessagePayload::Thinking { text } => Some(text.as_str()),
            MessagePayload::Error { error, message } => message.as_deref().or(Some(error.as_str())),
            MessagePayload::CommandExecution { output, .. } => output.as_deref(),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for CopilotMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(<D::Error as de::Error>::custom)
    }
}

impl Serialize for CopilotMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value()
            .map_err(<S::Error as ser::Error>::custom)?
            .serialize(serializer)
    }
}

/// A message written to the CLI's stdin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// A user prompt.
    Prompt { text: String, timestamp: i64 },
    /// Cancel the current operation.
    Abort { timestamp: i64 },
}

impl OutboundMessage {
    /// A prompt stamped with the current time.
    #[must_use]
    pub fn prompt(text: impl Into<String>) -> Self {
        Self::Prompt {
            text: text.into(),
            timestamp: now_millis(),
        }
    }

    /// An abort stamped with the current time.
    #[must_use]
    pub fn abort() -> Self {
        Self::Abort {
            timestamp: now_millis(),
        }
    }

    /// Encode as one newline-terminated JSON line.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
