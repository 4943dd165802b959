//! Extracted code blocks and conversation-turn identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A closed fenced code block found in accumulated assistant text.
///
/// Recomputed on every extraction pass; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlockMatch {
    /// Language tag on the opening fence (e.g. `html`).
    pub language: String,
    /// Block contents with surrounding whitespace trimmed.
    pub body: String,
    /// Byte offset one past the closing fence.
    pub span_end: usize,
}

/// Identity of one conversation turn.
///
/// Deferred work (debounced deliveries) is stamped with the turn that
/// scheduled it and dropped when the turn is no longer current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TurnId(pub u64);

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "turn-{}", self.0)
    }
}
