use thiserror::Error;

/// Failures of a relay session.
///
/// Only the session-fatal variants terminate a stream; a
/// [`RelayError::MalformedEvent`] is recovered locally by dropping the event.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RelayError {
    /// Upstream could not be reached at all.
    #[error("cannot reach upstream: {0}")]
    Connection(String),

    /// Upstream answered with a non-success status.
    #[error("upstream returned HTTP {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    /// The upstream connection dropped mid-stream.
    #[error("upstream stream error: {0}")]
    StreamTransport(String),

    /// A single line or payload could not be parsed.
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// The downstream consumer went away. Not a failure.
    #[error("downstream disconnected")]
    ClientDisconnect,
}

impl RelayError {
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            RelayError::Connection(_)
                | RelayError::UpstreamStatus { .. }
                | RelayError::StreamTransport(_)
        )
    }

    /// Upstream status code to forward, when one is known.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RelayError::UpstreamStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failures of a client-side conversation turn.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error("a response is already streaming")]
    InFlight,

    #[error("message is empty")]
    EmptyInput,

    #[error("request failed: {0}")]
    Request(String),

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("stream error: {0}")]
    Stream(String),

    /// Error event received from the relay.
    #[error("Stream processing error: {0}")]
    Remote(String),
}

/// Configuration validation failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
