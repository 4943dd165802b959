//! Relay session: one upstream stream transcoded into one downstream stream.
//!
//! Lifecycle: `Idle -> Streaming -> {Completed, Failed, Cancelled}`.
//!
//! - `Idle -> Streaming` happens in [`open_relay`] once the upstream answered
//!   with a success status. Failing before that point returns the error to
//!   the caller, which still owns a fresh (uncommitted) response.
//! - `Completed`: sentinel received, or upstream closed normally (the pending
//!   fragment is flushed first).
//! - `Failed`: upstream reported an error payload or the transport broke;
//!   one inline error event is forwarded before the downstream closes.
//! - `Cancelled`: the downstream receiver went away or the cancellation token
//!   fired; the upstream stream is dropped and nothing more is written.

use std::fmt;

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use fencecast_types::error::RelayError;
use fencecast_types::event::RelayEvent;
use fencecast_types::upstream::UpstreamRequest;

use super::upstream::{BoxUpstreamClient, ByteStream};
use crate::sse::{EventParser, LineBuffer, UpstreamTranscoder};

/// Message forwarded downstream when the upstream transport breaks mid-stream.
pub const STREAM_ERROR_MESSAGE: &str = "Stream error from source";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Idle,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayState::Idle => write!(f, "idle"),
            RelayState::Streaming => write!(f, "streaming"),
            RelayState::Completed => write!(f, "completed"),
            RelayState::Failed => write!(f, "failed"),
            RelayState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Summary of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOutcome {
    pub state: RelayState,
    /// Number of deltas written downstream.
    pub deltas: usize,
    /// Last finish reason reported by upstream, if any.
    pub finish_reason: Option<String>,
    /// Message of the error that failed the session.
    pub error: Option<String>,
}

enum Step {
    Continue,
    Stop(RelayState),
}

/// Per-request relay state. Owns the line buffer; private to one session.
pub struct RelaySession {
    id: Uuid,
    model: String,
    state: RelayState,
    buffer: LineBuffer,
    parser: EventParser<UpstreamTranscoder>,
    cancel: CancellationToken,
    deltas: usize,
    finish_reason: Option<String>,
    error: Option<String>,
}

impl RelaySession {
    pub fn new(id: Uuid, model: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            id,
            model: model.into(),
            state: RelayState::Idle,
            buffer: LineBuffer::new(),
            parser: EventParser::upstream(),
            cancel,
            deltas: 0,
            finish_reason: None,
            error: None,
        }
    }

    /// Pump `upstream` into `downstream` until a terminal state is reached.
    ///
    /// Dropping the downstream receiver (or cancelling the token) is noticed
    /// while waiting for the next upstream chunk, not only on the next write.
    pub async fn run(
        mut self,
        mut upstream: ByteStream,
        downstream: mpsc::Sender<RelayEvent>,
    ) -> RelayOutcome {
        self.state = RelayState::Streaming;
        tracing::debug!(session_id = %self.id, model = %self.model, "relay streaming");

        let terminal = loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break RelayState::Cancelled,
                _ = downstream.closed() => break RelayState::Cancelled,
                next = upstream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    if let Step::Stop(state) = self.forward_chunk(&chunk, &downstream).await {
                        break state;
                    }
                }
                Some(Err(e)) if e.is_session_fatal() => {
                    tracing::error!(error = %e, "error reading upstream stream");
                    self.error = Some(e.to_string());
                    let _ = downstream.send(RelayEvent::error(STREAM_ERROR_MESSAGE)).await;
                    break RelayState::Failed;
                }
                Some(Err(RelayError::ClientDisconnect)) => break RelayState::Cancelled,
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "skipping unusable upstream chunk");
                }
                None => {
                    tracing::info!("upstream stream finished");
                    break self.flush_pending(&downstream).await;
                }
            }
        };

        // Release the upstream connection explicitly rather than waiting for
        // the session future to be dropped.
        self.cancel.cancel();
        drop(upstream);

        if terminal == RelayState::Cancelled {
            tracing::info!("client disconnected, upstream request aborted");
        }
        self.state = terminal;

        let outcome = RelayOutcome {
            state: self.state,
            deltas: self.deltas,
            finish_reason: self.finish_reason,
            error: self.error,
        };
        tracing::info!(
            state = %outcome.state,
            deltas = outcome.deltas,
            finish_reason = outcome.finish_reason.as_deref().unwrap_or("-"),
            "relay session ended"
        );
        outcome
    }

    async fn forward_chunk(&mut self, chunk: &[u8], downstream: &mpsc::Sender<RelayEvent>) -> Step {
        for line in self.buffer.feed(chunk) {
            let Some(event) = self.parser.parse(&line) else {
                continue;
            };
            if let Step::Stop(state) = self.dispatch(event, downstream).await {
                return Step::Stop(state);
            }
        }
        Step::Continue
    }

    async fn flush_pending(&mut self, downstream: &mpsc::Sender<RelayEvent>) -> RelayState {
        let Some(line) = self.buffer.flush() else {
            return RelayState::Completed;
        };
        tracing::debug!(line = %line, "processing remaining buffer on end");
        match self.parser.parse(&line) {
            Some(event) => match self.dispatch(event, downstream).await {
                Step::Stop(state) => state,
                Step::Continue => RelayState::Completed,
            },
            None => RelayState::Completed,
        }
    }

    async fn dispatch(&mut self, event: RelayEvent, downstream: &mpsc::Sender<RelayEvent>) -> Step {
        match event {
            RelayEvent::Delta { .. } => {
                if downstream.send(event).await.is_err() {
                    return Step::Stop(RelayState::Cancelled);
                }
                self.deltas += 1;
                Step::Continue
            }
            RelayEvent::Done => {
                tracing::info!("received [DONE] marker from upstream");
                if downstream.send(RelayEvent::Done).await.is_err() {
                    return Step::Stop(RelayState::Cancelled);
                }
                Step::Stop(RelayState::Completed)
            }
            RelayEvent::Error { ref message } => {
                tracing::warn!(error = %message, "upstream reported an error");
                self.error = Some(message.clone());
                if downstream.send(event).await.is_err() {
                    return Step::Stop(RelayState::Cancelled);
                }
                Step::Stop(RelayState::Failed)
            }
            RelayEvent::Finished { reason } => {
                tracing::debug!(finish_reason = %reason, "upstream finished generating");
                self.finish_reason = Some(reason);
                Step::Continue
            }
            RelayEvent::Unrecognized { raw } => {
                tracing::warn!(payload = %raw, "data object without delta or finish reason");
                Step::Continue
            }
        }
    }
}

/// A running relay: the downstream receiver plus the session task.
#[derive(Debug)]
pub struct RelayHandle {
    pub session_id: Uuid,
    pub events: mpsc::Receiver<RelayEvent>,
    pub cancel: CancellationToken,
    pub task: JoinHandle<RelayOutcome>,
}

impl RelayHandle {
    /// Downstream events as a stream that cancels the session when dropped.
    ///
    /// The session task is detached; it logs its own outcome.
    pub fn into_event_stream(self) -> impl Stream<Item = RelayEvent> + Send + 'static {
        let guard = self.cancel.drop_guard();
        futures_util::stream::unfold((self.events, guard), |(mut events, guard)| async move {
            let event = events.recv().await?;
            Some((event, (events, guard)))
        })
    }
}

/// Open the upstream request and, on success, spawn a [`RelaySession`].
///
/// Errors are returned before anything is spawned, while the caller can
/// still choose a non-streaming response.
pub async fn open_relay(
    client: &BoxUpstreamClient,
    request: &UpstreamRequest,
    channel_capacity: usize,
) -> Result<RelayHandle, RelayError> {
    let session_id = Uuid::now_v7();
    let cancel = CancellationToken::new();
    let span = tracing::info_span!("relay", %session_id, model = %request.model);

    let upstream = client
        .open(request, cancel.clone())
        .instrument(span.clone())
        .await
        .inspect_err(|e| {
            let _entered = span.enter();
            tracing::error!(error = %e, status = ?e.status_code(), "failed to open upstream stream");
        })?;

    let (tx, rx) = mpsc::channel(channel_capacity.max(1));
    let session = RelaySession::new(session_id, request.model.clone(), cancel.clone());
    let task = tokio::spawn(session.run(upstream, tx).instrument(span));

    Ok(RelayHandle { session_id, events: rx, cancel, task })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;
    use crate::relay::upstream::UpstreamClient;
    use fencecast_types::message::Message;

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    /// Upstream that replays fixed chunks, optionally hanging afterwards.
    struct ScriptedUpstream {
        status: Option<RelayError>,
        chunks: Vec<Result<&'static str, RelayError>>,
        hang_after: bool,
        dropped: Arc<AtomicBool>,
    }

    impl ScriptedUpstream {
        fn new(chunks: Vec<Result<&'static str, RelayError>>) -> Self {
            Self {
                status: None,
                chunks,
                hang_after: false,
                dropped: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl UpstreamClient for ScriptedUpstream {
        async fn open(
            &self,
            _request: &UpstreamRequest,
            _cancel: CancellationToken,
        ) -> Result<ByteStream, RelayError> {
            if let Some(err) = self.status.clone() {
                return Err(err);
            }
            let chunks = self.chunks.clone();
            let hang_after = self.hang_after;
            let flag = DropFlag(self.dropped.clone());
            Ok(Box::pin(async_stream::stream! {
                let _flag = flag;
                for chunk in chunks {
                    yield chunk.map(|s| Bytes::from_static(s.as_bytes()));
                }
                if hang_after {
                    futures_util::future::pending::<()>().await;
                }
            }))
        }
    }

    fn request() -> UpstreamRequest {
        UpstreamRequest {
            model: "test-model".into(),
            messages: vec![Message::user("hi")],
            stream: true,
            temperature: 0.7,
            top_p: 0.9,
        }
    }

    async fn run_to_end(upstream: ScriptedUpstream) -> (Vec<RelayEvent>, RelayOutcome) {
        let client = BoxUpstreamClient::new(upstream);
        let mut handle = open_relay(&client, &request(), 8).await.unwrap();
        let mut events = Vec::new();
        while let Some(event) = handle.events.recv().await {
            events.push(event);
        }
        let outcome = handle.task.await.unwrap();
        (events, outcome)
    }

    #[tokio::test]
    async fn hello_world_scenario() {
        let upstream = ScriptedUpstream::new(vec![
            Ok("data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n"),
            Ok("data: {\"choices\":[{\"delta\":{\"content\":\" world\"}}]}\n\n"),
            Ok("data: [DONE]\n\n"),
        ]);
        let (events, outcome) = run_to_end(upstream).await;

        let frames: Vec<String> = events.iter().filter_map(|e| e.wire_data()).collect();
        assert_eq!(frames, vec!["{\"text\":\"Hello\"}", "{\"text\":\" world\"}", "[DONE]"]);
        assert_eq!(outcome.state, RelayState::Completed);
        assert_eq!(outcome.deltas, 2);
    }

    #[tokio::test]
    async fn events_split_mid_json_are_reassembled() {
        let upstream = ScriptedUpstream::new(vec![
            Ok("data: {\"choices\":[{\"del"),
            Ok("ta\":{\"content\":\"Hel"),
            Ok("lo\"}}]}\n"),
            Ok("\ndata: [DO"),
            Ok("NE]\n\n"),
        ]);
        let (events, outcome) = run_to_end(upstream).await;
        assert_eq!(events, vec![RelayEvent::delta("Hello"), RelayEvent::Done]);
        assert_eq!(outcome.state, RelayState::Completed);
    }

    #[tokio::test]
    async fn status_failure_surfaces_before_streaming() {
        let mut upstream = ScriptedUpstream::new(Vec::new());
        upstream.status = Some(RelayError::UpstreamStatus { status: 503, body: "busy".into() });
        let client = BoxUpstreamClient::new(upstream);

        let err = open_relay(&client, &request(), 8).await.unwrap_err();
        assert_eq!(err.status_code(), Some(503));
    }

    #[tokio::test]
    async fn transport_error_forwards_inline_error_then_closes() {
        let upstream = ScriptedUpstream::new(vec![
            Ok("data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n\n"),
            Err(RelayError::StreamTransport("connection reset".into())),
            Ok("data: {\"choices\":[{\"delta\":{\"content\":\"never\"}}]}\n\n"),
        ]);
        let (events, outcome) = run_to_end(upstream).await;
        assert_eq!(
            events,
            vec![RelayEvent::delta("partial"), RelayEvent::error(STREAM_ERROR_MESSAGE)]
        );
        assert_eq!(outcome.state, RelayState::Failed);
        assert!(outcome.error.unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn non_fatal_stream_errors_keep_the_session_alive() {
        let upstream = ScriptedUpstream::new(vec![
            Ok("data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n"),
            Err(RelayError::MalformedEvent("garbled chunk".into())),
            Ok("data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n\n"),
            Ok("data: [DONE]\n\n"),
        ]);
        let (events, outcome) = run_to_end(upstream).await;
        assert_eq!(
            events,
            vec![RelayEvent::delta("a"), RelayEvent::delta("b"), RelayEvent::Done]
        );
        assert_eq!(outcome.state, RelayState::Completed);

        let upstream = ScriptedUpstream::new(vec![
            Ok("data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n"),
            Err(RelayError::ClientDisconnect),
        ]);
        let (events, outcome) = run_to_end(upstream).await;
        assert_eq!(events, vec![RelayEvent::delta("a")]);
        assert_eq!(outcome.state, RelayState::Cancelled);
    }

    #[tokio::test]
    async fn upstream_error_payload_fails_session() {
        let upstream = ScriptedUpstream::new(vec![Ok(
            "data: {\"error\":{\"message\":\"model overloaded\"}}\n\n",
        )]);
        let (events, outcome) = run_to_end(upstream).await;
        assert_eq!(events, vec![RelayEvent::error("model overloaded")]);
        assert_eq!(outcome.state, RelayState::Failed);
    }

    #[tokio::test]
    async fn malformed_and_unknown_lines_do_not_end_the_stream() {
        let upstream = ScriptedUpstream::new(vec![
            Ok(": comment\n\nevent: ping\n"),
            Ok("data: {not json}\n\n"),
            Ok("data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n"),
            Ok("data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\n"),
            Ok("data: [DONE]\n\n"),
        ]);
        let (events, outcome) = run_to_end(upstream).await;
        assert_eq!(events, vec![RelayEvent::delta("ok"), RelayEvent::Done]);
        assert_eq!(outcome.state, RelayState::Completed);
    }

    #[tokio::test]
    async fn finish_reason_does_not_terminate_before_sentinel() {
        let upstream = ScriptedUpstream::new(vec![
            Ok("data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n"),
            Ok("data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n\n"),
            Ok("data: [DONE]\n\n"),
        ]);
        let (events, outcome) = run_to_end(upstream).await;
        assert_eq!(events, vec![RelayEvent::delta("late"), RelayEvent::Done]);
        assert_eq!(outcome.finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn sentinel_ends_session_and_releases_upstream() {
        let mut upstream = ScriptedUpstream::new(vec![Ok(
            "data: [DONE]\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"after\"}}]}\n\n",
        )]);
        upstream.hang_after = true;
        let dropped = upstream.dropped.clone();

        let (events, outcome) =
            tokio::time::timeout(Duration::from_secs(2), run_to_end(upstream)).await.unwrap();
        assert_eq!(events, vec![RelayEvent::Done]);
        assert_eq!(outcome.state, RelayState::Completed);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn normal_close_flushes_unterminated_fragment() {
        let upstream = ScriptedUpstream::new(vec![
            Ok("data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n"),
            Ok("data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}"),
        ]);
        let (events, outcome) = run_to_end(upstream).await;
        assert_eq!(events, vec![RelayEvent::delta("a"), RelayEvent::delta("tail")]);
        assert_eq!(outcome.state, RelayState::Completed);
    }

    #[tokio::test]
    async fn downstream_disconnect_aborts_upstream() {
        let mut upstream = ScriptedUpstream::new(vec![Ok(
            "data: {\"choices\":[{\"delta\":{\"content\":\"first\"}}]}\n\n",
        )]);
        upstream.hang_after = true;
        let dropped = upstream.dropped.clone();
        let client = BoxUpstreamClient::new(upstream);

        let mut handle = open_relay(&client, &request(), 8).await.unwrap();
        assert_eq!(handle.events.recv().await, Some(RelayEvent::delta("first")));
        assert!(!dropped.load(Ordering::SeqCst));

        let RelayHandle { events, cancel, task, .. } = handle;
        drop(events);

        let outcome = tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert_eq!(outcome.state, RelayState::Cancelled);
        assert!(dropped.load(Ordering::SeqCst));
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn dropping_event_stream_cancels_session() {
        let mut upstream = ScriptedUpstream::new(vec![Ok(
            "data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n\n",
        )]);
        upstream.hang_after = true;
        let dropped = upstream.dropped.clone();
        let client = BoxUpstreamClient::new(upstream);

        let handle = open_relay(&client, &request(), 8).await.unwrap();
        let cancel = handle.cancel.clone();
        let mut stream = Box::pin(handle.into_event_stream());
        assert_eq!(stream.next().await, Some(RelayEvent::delta("x")));
        drop(stream);

        assert!(cancel.is_cancelled());
        tokio::time::timeout(Duration::from_secs(2), async {
            while !dropped.load(Ordering::SeqCst) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }
}
