//! Upstream chat-completions wire shapes.
//!
//! Only the fields the relay reads are modeled; everything else in an
//! upstream chunk (ids, usage, logprobs, ...) is ignored on deserialization.

use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Streaming request body sent to `{upstream_url}/chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub stream: bool,
    pub temperature: f64,
    pub top_p: f64,
}

/// One decoded `data:` payload from the upstream stream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamChunk {
    #[serde(default)]
    pub choices: Vec<UpstreamChoice>,
    /// Either a bare string or an object carrying a `message` field.
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamChoice {
    #[serde(default)]
    pub delta: UpstreamDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamDelta {
    #[serde(default)]
    pub content: Option<String>,
}

impl UpstreamChunk {
    /// Human-readable error message, if the chunk carries one.
    pub fn error_message(&self) -> Option<String> {
        match self.error.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(obj) => Some(
                obj.get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| serde_json::Value::Object(obj.clone()).to_string()),
            ),
            other => Some(other.to_string()),
        }
    }

    /// Non-empty text delta from the first choice.
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()?
            .delta
            .content
            .as_deref()
            .filter(|c| !c.is_empty())
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.choices.first()?.finish_reason.as_deref()
    }
}
