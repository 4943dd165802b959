//! Shared domain types for fencecast.
//!
//! This crate contains the data shapes that cross crate boundaries:
//! conversation messages, upstream/downstream wire payloads, relay events,
//! extracted code blocks, configuration, and the error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, serde_json, thiserror.

pub mod artifact;
pub mod config;
pub mod error;
pub mod event;
pub mod message;
pub mod upstream;
