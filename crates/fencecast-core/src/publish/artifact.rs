use fencecast_types::artifact::{CodeBlockMatch, TurnId};

use super::debounce::Debouncer;

/// Feeds extraction results into a debouncer, skipping repeats.
///
/// Remembers the last body handed to the presentation side across turns,
/// so that a turn ending without any artifact can clear a stale preview.
#[derive(Debug)]
pub struct ArtifactPublisher {
    debouncer: Debouncer<String>,
    last: String,
}

impl ArtifactPublisher {
    pub fn new(debouncer: Debouncer<String>) -> Self {
        Self { debouncer, last: String::new() }
    }

    /// Schedule the current extraction result. `None` leaves the preview as is.
    pub fn update(&mut self, turn: TurnId, artifact: Option<&CodeBlockMatch>) {
        if let Some(m) = artifact {
            self.schedule(turn, &m.body);
        }
    }

    /// Final pass for a turn: publish the last artifact, or clear the
    /// preview if the turn produced none and something is still shown.
    pub fn finish(&mut self, turn: TurnId, artifact: Option<&CodeBlockMatch>) {
        match artifact {
            Some(m) => self.schedule(turn, &m.body),
            None if !self.last.is_empty() => {
                tracing::debug!(turn_id = %turn, "clearing artifact, final message has none");
                self.schedule(turn, "");
            }
            None => {}
        }
    }

    pub async fn shutdown(self) {
        self.debouncer.shutdown().await;
    }

    fn schedule(&mut self, turn: TurnId, body: &str) {
        if self.last == body {
            return;
        }
        self.last = body.to_string();
        self.debouncer.publish(turn, self.last.clone());
    }
}
