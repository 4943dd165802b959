//! RelayClient -- the terminal chat's connection to a fencecast relay.
//!
//! Posts the conversation to `/api/chat/stream` and hands back the raw
//! response body; decoding the frames is left to
//! [`fencecast_core::chat::TurnConsumer`].

use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt, TryStreamExt};
use reqwest::header::ACCEPT;
use tokio_util::sync::CancellationToken;

use fencecast_types::config::ClientConfig;
use fencecast_types::error::TurnError;
use fencecast_types::message::ChatStreamRequest;

/// Body chunks of a relay response.
pub type TurnByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TurnError>> + Send + 'static>>;

#[derive(Debug, Clone)]
pub struct RelayClient {
    client: reqwest::Client,
    url: String,
}

impl RelayClient {
    pub fn new(config: &ClientConfig) -> Result<Self, TurnError> {
        // No overall timeout: a generation can stream for minutes.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TurnError::Request(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, url: config.stream_url() })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Start a turn. Non-success responses are turned into
    /// [`TurnError::Status`] with the message the relay reported.
    pub async fn open_turn(
        &self,
        request: &ChatStreamRequest,
        cancel: CancellationToken,
    ) -> Result<TurnByteStream, TurnError> {
        let send = self
            .client
            .post(&self.url)
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send();

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(TurnError::Request("cancelled".to_string())),
            response = send => response.map_err(|e| TurnError::Request(e.to_string()))?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(status.as_u16(), &body);
            tracing::debug!(status = status.as_u16(), error = %message, "relay rejected request");
            return Err(TurnError::Status { status: status.as_u16(), message });
        }

        let stream = response
            .bytes_stream()
            .map_err(|e| TurnError::Stream(e.to_string()))
            .take_until(cancel.cancelled_owned());
        Ok(Box::pin(stream))
    }
}

/// Message for a failed relay response: the JSON `error` field, else the
/// raw body, else a generic status line.
pub fn error_message(status: u16, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        match value.get("error") {
            Some(serde_json::Value::String(msg)) if !msg.is_empty() => return msg.clone(),
            Some(serde_json::Value::Null) | None => {}
            Some(other) => return other.to_string(),
        }
    }
    if body.trim().is_empty() {
        format!("HTTP error! status: {status}")
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::post;

    use super::*;
    use fencecast_types::message::Message;

    #[test]
    fn error_message_prefers_json_error_field() {
        assert_eq!(
            error_message(400, r#"{"error":"Invalid request body: messages array is required."}"#),
            "Invalid request body: messages array is required."
        );
        assert_eq!(error_message(502, r#"{"detail":"x"}"#), r#"{"detail":"x"}"#);
        assert_eq!(error_message(502, "Bad Gateway"), "Bad Gateway");
        assert_eq!(error_message(500, ""), "HTTP error! status: 500");
    }

    async fn serve(router: Router) -> ClientConfig {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        ClientConfig { server_url: format!("http://{addr}"), ..ClientConfig::default() }
    }

    fn request() -> ChatStreamRequest {
        ChatStreamRequest::new(vec![Message::user("hi")], "m")
    }

    #[tokio::test]
    async fn relay_error_response_becomes_status_error() {
        let router = Router::new().route(
            "/api/chat/stream",
            post(|| async {
                (StatusCode::SERVICE_UNAVAILABLE, axum::Json(serde_json::json!({"error": "Upstream API error: busy"})))
            }),
        );
        let client = RelayClient::new(&serve(router).await).unwrap();

        let err = match client.open_turn(&request(), CancellationToken::new()).await {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert_eq!(
            err,
            TurnError::Status { status: 503, message: "Upstream API error: busy".into() }
        );
    }

    #[tokio::test]
    async fn success_returns_raw_body_chunks() {
        let router = Router::new().route(
            "/api/chat/stream",
            post(|| async { "data: {\"text\":\"hi\"}\n\ndata: [DONE]\n\n" }),
        );
        let client = RelayClient::new(&serve(router).await).unwrap();

        let stream = client.open_turn(&request(), CancellationToken::new()).await.unwrap();
        let body: Vec<u8> = stream
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await
            .unwrap();
        assert_eq!(body, b"data: {\"text\":\"hi\"}\n\ndata: [DONE]\n\n");
    }
}
