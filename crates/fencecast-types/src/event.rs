//! Relay events and the downstream SSE wire format.
//!
//! Downstream frames are always `data: <payload>\n\n` where the payload is
//! one of:
//! - `{"text": "..."}` -- incremental text
//! - `{"error": "..."}` -- fatal error, stream closes afterwards
//! - `[DONE]` -- literal sentinel, not JSON

use serde::{Deserialize, Serialize};

/// Field prefix recognized on SSE lines.
pub const DATA_PREFIX: &str = "data:";

/// Literal sentinel that terminates a stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Events flowing through the relay, produced by the event parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// Incremental text.
    Delta { text: String },

    /// Sentinel termination token.
    Done,

    /// Error reported by the producer.
    Error { message: String },

    /// Upstream reported a finish reason. Observed and logged, never
    /// forwarded; termination is driven by [`RelayEvent::Done`].
    Finished { reason: String },

    /// Valid JSON that carried nothing the relay understands.
    Unrecognized { raw: String },
}

impl RelayEvent {
    pub fn delta(text: impl Into<String>) -> Self {
        RelayEvent::Delta { text: text.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        RelayEvent::Error { message: message.into() }
    }

    /// The payload to place after `data: ` downstream, or `None` for events
    /// that are never forwarded.
    pub fn wire_data(&self) -> Option<String> {
        match self {
            RelayEvent::Delta { text } => {
                Some(serde_json::to_string(&DownstreamPayload::text(text)).unwrap_or_default())
            }
            RelayEvent::Done => Some(DONE_SENTINEL.to_string()),
            RelayEvent::Error { message } => {
                Some(serde_json::to_string(&DownstreamPayload::error(message)).unwrap_or_default())
            }
            RelayEvent::Finished { .. } | RelayEvent::Unrecognized { .. } => None,
        }
    }
}

/// JSON payload of a downstream `data:` line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownstreamPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DownstreamPayload {
    pub fn text(text: &str) -> Self {
        Self { text: Some(text.to_string()), error: None }
    }

    pub fn error(message: &str) -> Self {
        Self { text: None, error: Some(message.to_string()) }
    }
}
