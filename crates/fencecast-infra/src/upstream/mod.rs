//! Upstream API adapters implementing [`fencecast_core::relay::UpstreamClient`].

pub mod chat_completions;

pub use chat_completions::ChatCompletionsClient;
