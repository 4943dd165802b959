//! Infrastructure layer for fencecast.
//!
//! Network and filesystem adapters for the ports defined in
//! `fencecast-core`: the chat-completions upstream client used by the relay,
//! the relay client used by the terminal chat, configuration loading, and
//! API key resolution.

pub mod client;
pub mod config;
pub mod secret;
pub mod upstream;
