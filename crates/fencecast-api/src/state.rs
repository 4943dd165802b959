//! Shared state for the HTTP relay.

use std::sync::Arc;

use fencecast_core::relay::BoxUpstreamClient;
use fencecast_infra::secret::api_key_from_env;
use fencecast_infra::upstream::ChatCompletionsClient;
use fencecast_types::config::RelayConfig;

/// State handed to every handler. Sessions share nothing else.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub upstream: Arc<BoxUpstreamClient>,
}

impl AppState {
    pub fn new(config: RelayConfig, upstream: BoxUpstreamClient) -> Self {
        Self {
            config: Arc::new(config),
            upstream: Arc::new(upstream),
        }
    }

    /// Validate the config and wire the chat-completions upstream client.
    pub fn init(config: RelayConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let client = ChatCompletionsClient::new(&config, api_key_from_env())?;
        tracing::info!(upstream = client.url(), default_model = %config.default_model, "upstream configured");
        Ok(Self::new(config, BoxUpstreamClient::new(client)))
    }
}
