//! ChatCompletionsClient -- [`UpstreamClient`] for OpenAI-compatible
//! `/chat/completions` endpoints with `stream: true`.
//!
//! The API key is wrapped in [`SecretString`] and only exposed when building
//! the `Authorization` header.

use std::time::Duration;

use futures_util::{StreamExt, TryStreamExt};
use reqwest::header::ACCEPT;
use secrecy::{ExposeSecret, SecretString};
use tokio_util::sync::CancellationToken;

use fencecast_core::relay::{ByteStream, UpstreamClient};
use fencecast_types::config::RelayConfig;
use fencecast_types::error::RelayError;
use fencecast_types::upstream::UpstreamRequest;

/// Streaming client for an OpenAI-compatible chat-completions API.
///
/// Does not derive Debug so that the key can never end up in a log line.
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    url: String,
    api_key: Option<SecretString>,
}

impl ChatCompletionsClient {
    /// Build a client for `config.completions_url()`.
    ///
    /// A missing key is allowed: requests are then sent without
    /// authorization, which some self-hosted servers accept.
    pub fn new(config: &RelayConfig, api_key: Option<SecretString>) -> Result<Self, RelayError> {
        // Idle limit only: a whole-request timeout would cut long generations.
        let client = reqwest::Client::builder()
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| RelayError::Connection(format!("failed to create HTTP client: {e}")))?;

        if api_key.is_none() {
            tracing::warn!("Upstream API key is not set, requests are sent without authorization");
        }

        Ok(Self {
            client,
            url: config.completions_url(),
            api_key,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl UpstreamClient for ChatCompletionsClient {
    async fn open(
        &self,
        request: &UpstreamRequest,
        cancel: CancellationToken,
    ) -> Result<ByteStream, RelayError> {
        let mut builder = self
            .client
            .post(&self.url)
            .header(ACCEPT, "text/event-stream")
            .json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        tracing::debug!(url = %self.url, messages = request.messages.len(), "sending upstream request");

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(RelayError::ClientDisconnect),
            response = builder.send() => {
                response.map_err(|e| RelayError::Connection(e.to_string()))?
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) if !body.is_empty() => body,
                Ok(_) => format!("Status Code: {}", status.as_u16()),
                Err(e) => {
                    tracing::error!(error = %e, "could not read upstream error body");
                    format!("Status Code: {}", status.as_u16())
                }
            };
            tracing::error!(status = status.as_u16(), body = %body, "upstream API error");
            return Err(RelayError::UpstreamStatus { status: status.as_u16(), body });
        }

        tracing::debug!(status = status.as_u16(), "upstream stream opened");
        let stream = response
            .bytes_stream()
            .map_err(|e| RelayError::StreamTransport(e.to_string()))
            .take_until(cancel.cancelled_owned());
        Ok(Box::pin(stream))
    }
}
