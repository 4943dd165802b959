use fencecast_types::artifact::TurnId;
use fencecast_types::error::TurnError;
use fencecast_types::message::{Message, MessageRole};

use crate::publish::TurnClock;

/// Client-side conversation history.
///
/// Messages are append-only except the trailing assistant message of the
/// turn in flight, which grows as deltas arrive. Only one turn may be in
/// flight at a time.
#[derive(Debug)]
pub struct Conversation {
    messages: Vec<Message>,
    in_flight: Option<TurnId>,
    clock: TurnClock,
}

impl Conversation {
    pub fn new(system_prompt: Option<&str>, clock: TurnClock) -> Self {
        let messages = system_prompt
            .filter(|p| !p.trim().is_empty())
            .map(|p| vec![Message::system(p)])
            .unwrap_or_default();
        Self { messages, in_flight: None, clock }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn in_flight(&self) -> Option<TurnId> {
        self.in_flight
    }

    pub fn clock(&self) -> &TurnClock {
        &self.clock
    }

    /// Start a turn for `input`.
    ///
    /// Returns the new turn id and the history to send, which ends with the
    /// user message. An empty assistant placeholder is appended afterwards
    /// and is not part of the returned history.
    pub fn begin_turn(&mut self, input: &str) -> Result<(TurnId, Vec<Message>), TurnError> {
        if self.in_flight.is_some() {
            return Err(TurnError::InFlight);
        }
        if input.trim().is_empty() {
            return Err(TurnError::EmptyInput);
        }

        self.messages.push(Message::user(input));
        let history = self.messages.clone();
        self.messages.push(Message::assistant(""));

        let turn = self.clock.advance();
        self.in_flight = Some(turn);
        tracing::debug!(turn_id = %turn, messages = history.len(), "turn started");
        Ok((turn, history))
    }

    /// Append a delta to the assistant message of the turn in flight.
    pub fn append_delta(&mut self, delta: &str) {
        if self.in_flight.is_none() {
            return;
        }
        if let Some(last) = self.trailing_assistant() {
            last.content.push_str(delta);
        }
    }

    /// Append a visible error note, keeping any partial content.
    pub fn annotate_error(&mut self, error: &TurnError) {
        let note = format!("[Error: {error}]");
        match self.trailing_assistant() {
            Some(last) if last.content.is_empty() => last.content = note,
            Some(last) => {
                last.content.push_str("\n\n");
                last.content.push_str(&note);
            }
            None => self.messages.push(Message::assistant(note)),
        }
    }

    pub fn end_turn(&mut self) {
        if let Some(turn) = self.in_flight.take() {
            tracing::debug!(turn_id = %turn, "turn ended");
        }
    }

    /// Drop everything except system messages.
    pub fn clear(&mut self) -> Result<(), TurnError> {
        if self.in_flight.is_some() {
            return Err(TurnError::InFlight);
        }
        self.messages.retain(|m| m.role == MessageRole::System);
        Ok(())
    }

    fn trailing_assistant(&mut self) -> Option<&mut Message> {
        self.messages.last_mut().filter(|m| m.role == MessageRole::Assistant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation() -> Conversation {
        Conversation::new(Some("You are helpful."), TurnClock::new())
    }

    #[test]
    fn history_is_seeded_with_system_prompt() {
        let c = conversation();
        assert_eq!(c.messages(), &[Message::system("You are helpful.")]);
        assert!(Conversation::new(Some("  "), TurnClock::new()).messages().is_empty());
    }

    #[test]
    fn begin_turn_returns_history_without_placeholder() {
        let mut c = conversation();
        let (turn, history) = c.begin_turn("make a button").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1], Message::user("make a button"));
        assert_eq!(c.messages().last(), Some(&Message::assistant("")));
        assert_eq!(c.in_flight(), Some(turn));
        assert!(c.clock().is_current(turn));
    }

    #[test]
    fn second_send_while_in_flight_is_rejected() {
        let mut c = conversation();
        c.begin_turn("one").unwrap();
        assert_eq!(c.begin_turn("two").unwrap_err(), TurnError::InFlight);
        assert_eq!(c.clear().unwrap_err(), TurnError::InFlight);
        c.end_turn();
        assert!(c.begin_turn("two").is_ok());
    }

    #[test]
    fn empty_input_is_rejected() {
        let mut c = conversation();
        assert_eq!(c.begin_turn("   ").unwrap_err(), TurnError::EmptyInput);
        assert_eq!(c.messages().len(), 1);
    }

    #[test]
    fn deltas_grow_trailing_assistant_message() {
        let mut c = conversation();
        c.begin_turn("hi").unwrap();
        c.append_delta("Hello");
        c.append_delta(" world");
        assert_eq!(c.messages().last().unwrap().content, "Hello world");
    }

    #[test]
    fn error_annotation_preserves_partial_content() {
        let mut c = conversation();
        c.begin_turn("hi").unwrap();
        c.append_delta("partial");
        c.annotate_error(&TurnError::Remote("boom".into()));
        assert_eq!(
            c.messages().last().unwrap().content,
            "partial\n\n[Error: Stream processing error: boom]"
        );
    }

    #[test]
    fn error_annotation_on_empty_placeholder() {
        let mut c = conversation();
        c.begin_turn("hi").unwrap();
        c.annotate_error(&TurnError::Status { status: 503, message: "busy".into() });
        assert_eq!(c.messages().last().unwrap().content, "[Error: busy]");
    }

    #[test]
    fn clear_keeps_system_prompt() {
        let mut c = conversation();
        c.begin_turn("hi").unwrap();
        c.end_turn();
        c.clear().unwrap();
        assert_eq!(c.messages(), &[Message::system("You are helpful.")]);
    }
}
