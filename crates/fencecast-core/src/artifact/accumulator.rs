use fencecast_types::artifact::{CodeBlockMatch, TurnId};

use super::extractor::ArtifactExtractor;

/// Growing assistant text for one conversation turn.
///
/// Every appended delta triggers a full extraction pass over the
/// accumulated text, so the latest artifact always reflects the whole
/// message rather than the last chunk.
#[derive(Debug, Clone)]
pub struct TurnAccumulator {
    turn: TurnId,
    text: String,
    extractor: ArtifactExtractor,
    latest: Option<CodeBlockMatch>,
}

impl TurnAccumulator {
    pub fn new(turn: TurnId, extractor: ArtifactExtractor) -> Self {
        Self {
            turn,
            text: String::new(),
            extractor,
            latest: None,
        }
    }

    pub fn turn(&self) -> TurnId {
        self.turn
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Append a delta and re-extract.
    pub fn push_delta(&mut self, delta: &str) -> Option<&CodeBlockMatch> {
        self.text.push_str(delta);
        self.latest = self.extractor.extract(&self.text);
        self.latest.as_ref()
    }

    /// Final extraction pass at end of stream.
    pub fn finish(&mut self) -> Option<&CodeBlockMatch> {
        self.latest = self.extractor.extract(&self.text);
        self.latest.as_ref()
    }
}
