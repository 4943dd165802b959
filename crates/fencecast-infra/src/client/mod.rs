//! HTTP client side of the relay protocol.

pub mod relay;

pub use relay::{RelayClient, TurnByteStream, error_message};
