//! Interactive terminal chat against a fencecast relay.
//!
//! Entry point: [`loop_runner::run_chat`].

pub mod commands;
pub mod input;
pub mod loop_runner;
pub mod preview;
