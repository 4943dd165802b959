//! Configuration types for the relay server and the terminal client.
//!
//! `FencecastConfig` represents the optional `fencecast.toml`. Every field
//! has a default, so an empty file (or no file) is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FencecastConfig {
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

/// Relay server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    /// Base URL of the OpenAI-compatible upstream; `/chat/completions` is appended.
    pub upstream_url: String,
    /// Model used when the request names none.
    pub default_model: String,
    pub temperature: f64,
    pub top_p: f64,
    /// Longest silence tolerated between upstream body chunks. A stream that
    /// keeps delivering is never cut, however long it runs.
    pub read_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Downstream frames buffered per session before backpressure applies.
    pub channel_capacity: usize,
    /// Interval of SSE keep-alive comments.
    pub keep_alive_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            upstream_url: "https://vllm.tesslate.com/v1".to_string(),
            default_model: "Tesslate/UIGEN-T2-7B-3600".to_string(),
            temperature: 0.7,
            top_p: 0.9,
            read_timeout_secs: 300,
            connect_timeout_secs: 10,
            channel_capacity: 64,
            keep_alive_secs: 15,
        }
    }
}

impl RelayConfig {
    /// Full streaming endpoint of the upstream.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.upstream_url.trim_end_matches('/'))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "upstream_url",
                reason: "must not be empty".to_string(),
            });
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid {
                field: "temperature",
                reason: format!("{} is outside [0, 2]", self.temperature),
            });
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "top_p",
                reason: format!("{} is outside (0, 1]", self.top_p),
            });
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "channel_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.keep_alive_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "keep_alive_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.read_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "read_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Terminal client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_url: String,
    /// Model to request; `None` lets the relay choose its default.
    pub model: Option<String>,
    pub system_prompt: String,
    /// Language tag of the fenced blocks that are previewed.
    pub artifact_language: String,
    pub extract_debounce_ms: u64,
    pub preview_refresh_ms: u64,
    pub preview_path: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3001".to_string(),
            model: None,
            system_prompt:
                "You are a helpful assistant specialized in UI generation. Answer with a single \
                 ```html fenced block when producing a page."
                    .to_string(),
            artifact_language: "html".to_string(),
            extract_debounce_ms: 150,
            preview_refresh_ms: 50,
            preview_path: "preview.html".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn stream_url(&self) -> String {
        format!("{}/api/chat/stream", self.server_url.trim_end_matches('/'))
    }
}
