use fencecast_types::error::RelayError;
use fencecast_types::event::{DATA_PREFIX, DONE_SENTINEL, RelayEvent};

use super::transcoder::{DownstreamTranscoder, Transcode, UpstreamTranscoder};

/// Turns single SSE lines into [`RelayEvent`]s.
///
/// Only `data:` lines are meaningful. The sentinel becomes
/// [`RelayEvent::Done`]; any other payload is decoded as JSON and handed to
/// the transcoder. Nothing a single line contains can abort a stream.
#[derive(Debug, Clone, Default)]
pub struct EventParser<T> {
    transcoder: T,
}

impl EventParser<UpstreamTranscoder> {
    /// Parser for a chat-completions upstream.
    pub fn upstream() -> Self {
        Self::new(UpstreamTranscoder)
    }
}

impl EventParser<DownstreamTranscoder> {
    /// Parser for the relay's own downstream frames.
    pub fn downstream() -> Self {
        Self::new(DownstreamTranscoder)
    }
}

impl<T: Transcode> EventParser<T> {
    pub fn new(transcoder: T) -> Self {
        Self { transcoder }
    }

    /// Parse a line, dropping (and logging) anything malformed.
    pub fn parse(&self, line: &str) -> Option<RelayEvent> {
        match self.try_parse(line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed event");
                None
            }
        }
    }

    /// Parse a line, reporting undecodable JSON as
    /// [`RelayError::MalformedEvent`].
    ///
    /// `Ok(None)` means the line is not a `data:` line (blank separators,
    /// comments, `event:`/`id:` fields).
    pub fn try_parse(&self, line: &str) -> Result<Option<RelayEvent>, RelayError> {
        let trimmed = line.trim();
        let Some(rest) = trimmed.strip_prefix(DATA_PREFIX) else {
            if !trimmed.is_empty() {
                tracing::debug!(line = trimmed, "ignoring non-data line");
            }
            return Ok(None);
        };

        let data = rest.trim();
        if data == DONE_SENTINEL {
            return Ok(Some(RelayEvent::Done));
        }

        let payload: serde_json::Value = serde_json::from_str(data)
            .map_err(|e| RelayError::MalformedEvent(format!("{e}: {data}")))?;
        Ok(Some(self.transcoder.transcode(payload)))
    }
}
