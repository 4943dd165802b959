//! Debounced delivery of artifacts to the presentation side.

mod artifact;
mod debounce;

pub use artifact::ArtifactPublisher;
pub use debounce::{DebounceSender, Debouncer, TurnClock};
