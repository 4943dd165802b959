//! Payload-to-event mapping for the two legs of the relay.

use serde::Deserialize;

use fencecast_types::event::{DownstreamPayload, RelayEvent};
use fencecast_types::upstream::UpstreamChunk;

/// Maps one decoded JSON payload into a [`RelayEvent`].
pub trait Transcode {
    fn transcode(&self, payload: serde_json::Value) -> RelayEvent;
}

/// Reads chat-completions chunks: `{choices:[{delta:{content?}, finish_reason?}], error?}`.
///
/// Rule order: `error` wins, then a non-empty `choices[0].delta.content`,
/// then `choices[0].finish_reason`. Anything else is unrecognized.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpstreamTranscoder;

impl Transcode for UpstreamTranscoder {
    fn transcode(&self, payload: serde_json::Value) -> RelayEvent {
        let chunk = match UpstreamChunk::deserialize(&payload) {
            Ok(chunk) => chunk,
            Err(_) => return RelayEvent::Unrecognized { raw: payload.to_string() },
        };

        if let Some(message) = chunk.error_message() {
            return RelayEvent::Error { message };
        }
        if let Some(text) = chunk.content() {
            return RelayEvent::delta(text);
        }
        if let Some(reason) = chunk.finish_reason() {
            return RelayEvent::Finished { reason: reason.to_string() };
        }
        RelayEvent::Unrecognized { raw: payload.to_string() }
    }
}

/// Reads the relay's own frames: `{"text": ...}` or `{"error": ...}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DownstreamTranscoder;

impl Transcode for DownstreamTranscoder {
    fn transcode(&self, payload: serde_json::Value) -> RelayEvent {
        let frame = match DownstreamPayload::deserialize(&payload) {
            Ok(frame) => frame,
            Err(_) => return RelayEvent::Unrecognized { raw: payload.to_string() },
        };

        match frame {
            DownstreamPayload { error: Some(message), .. } => RelayEvent::Error { message },
            DownstreamPayload { text: Some(text), .. } if !text.is_empty() => RelayEvent::Delta { text },
            _ => RelayEvent::Unrecognized { raw: payload.to_string() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn upstream_error_takes_precedence_over_content() {
        let event = UpstreamTranscoder.transcode(json!({
            "error": "rate limited",
            "choices": [{"delta": {"content": "ignored"}}]
        }));
        assert_eq!(event, RelayEvent::error("rate limited"));
    }

    #[test]
    fn upstream_content_becomes_delta() {
        let event = UpstreamTranscoder.transcode(json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "delta": {"content": "Hello"}, "finish_reason": null}]
        }));
        assert_eq!(event, RelayEvent::delta("Hello"));
    }

    #[test]
    fn upstream_finish_reason_is_an_internal_marker() {
        let event = UpstreamTranscoder.transcode(json!({
            "choices": [{"delta": {}, "finish_reason": "stop"}]
        }));
        assert_eq!(event, RelayEvent::Finished { reason: "stop".into() });
    }

    #[test]
    fn upstream_role_only_chunk_is_unrecognized() {
        let event = UpstreamTranscoder.transcode(json!({
            "choices": [{"delta": {"role": "assistant"}}]
        }));
        assert!(matches!(event, RelayEvent::Unrecognized { .. }));
    }

    #[test]
    fn upstream_wrong_shape_is_unrecognized() {
        assert!(matches!(
            UpstreamTranscoder.transcode(json!({"choices": "nope"})),
            RelayEvent::Unrecognized { .. }
        ));
        assert!(matches!(UpstreamTranscoder.transcode(json!(42)), RelayEvent::Unrecognized { .. }));
    }

    #[test]
    fn downstream_frames() {
        assert_eq!(DownstreamTranscoder.transcode(json!({"text": "hi"})), RelayEvent::delta("hi"));
        assert_eq!(
            DownstreamTranscoder.transcode(json!({"error": "Stream error from source"})),
            RelayEvent::error("Stream error from source")
        );
        assert!(matches!(
            DownstreamTranscoder.transcode(json!({"text": ""})),
            RelayEvent::Unrecognized { .. }
        ));
    }
}
