//! Core logic for fencecast.
//!
//! Server side, bytes flow one way:
//! upstream chunks -> [`sse::LineBuffer`] -> [`sse::EventParser`] ->
//! [`relay::RelaySession`] -> downstream frames.
//!
//! Client side, the same line buffer and parser decode the relay's frames,
//! [`artifact::TurnAccumulator`] grows the assistant text, and
//! [`publish::ArtifactPublisher`] debounces the extracted code block.
//!
//! This crate defines the upstream port ([`relay::UpstreamClient`]) that the
//! infrastructure layer implements; it performs no network I/O itself.

pub mod artifact;
pub mod chat;
pub mod publish;
pub mod relay;
pub mod sse;
