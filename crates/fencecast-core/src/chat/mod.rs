//! Client side of the relay: conversation history and the per-turn
//! stream consumer.

mod consumer;
mod conversation;

pub use consumer::{TurnConsumer, TurnOutcome};
pub use conversation::Conversation;
