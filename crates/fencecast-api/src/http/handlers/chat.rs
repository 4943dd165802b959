//! SSE relay endpoint.
//!
//! POST /api/chat/stream
//!
//! Opens a streaming request against the upstream chat-completions API and
//! re-emits it as a minimal SSE stream:
//! - `data: {"text": "..."}` for every text delta
//! - `data: {"error": "..."}` once, before closing, on a mid-stream failure
//! - `data: [DONE]` when upstream sends its sentinel
//!
//! Failures before the upstream answered with a success status are returned
//! as a plain JSON error instead, with the upstream status when there is one.

use std::convert::Infallible;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::{Stream, StreamExt, future};

use fencecast_core::relay::open_relay;
use fencecast_types::message::ChatStreamRequest;
use fencecast_types::upstream::UpstreamRequest;

use crate::http::error::{AppError, INVALID_BODY_MESSAGE};
use crate::state::AppState;

/// Characters of each message included in the request log.
const LOG_SNIPPET_CHARS: usize = 50;

pub async fn stream_chat(
    State(state): State<AppState>,
    body: Result<Json<ChatStreamRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let Json(body) = body.map_err(|e| {
        tracing::warn!(error = %e, "rejecting chat request");
        AppError::BadRequest(INVALID_BODY_MESSAGE.to_string())
    })?;

    let model = match body.requested_model() {
        Some(model) => model.to_string(),
        None => {
            tracing::warn!("Model not provided or invalid in request, using default");
            state.config.default_model.clone()
        }
    };

    tracing::info!(model = %model, messages = body.messages.len(), "received chat stream request");
    for message in &body.messages {
        tracing::info!(role = %message.role, content = %message.snippet(LOG_SNIPPET_CHARS), "message");
    }

    let request = UpstreamRequest {
        model,
        messages: body.messages,
        stream: true,
        temperature: state.config.temperature,
        top_p: state.config.top_p,
    };

    let handle = open_relay(&state.upstream, &request, state.config.channel_capacity).await?;
    tracing::debug!(session_id = %handle.session_id, "relay session started");

    let events = handle
        .into_event_stream()
        .filter_map(|event| future::ready(event.wire_data().map(|data| Ok(Event::default().data(data)))));

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(state.config.keep_alive_secs))))
}
