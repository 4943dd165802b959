use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use fencecast_types::artifact::{CodeBlockMatch, TurnId};
use fencecast_types::error::TurnError;
use fencecast_types::event::RelayEvent;

use crate::artifact::{ArtifactExtractor, TurnAccumulator};
use crate::publish::ArtifactPublisher;
use crate::sse::{DownstreamTranscoder, EventParser, LineBuffer};

/// How a turn's stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub turn: TurnId,
    /// Full accumulated assistant text.
    pub text: String,
    /// Result of the final extraction pass.
    pub artifact: Option<CodeBlockMatch>,
    /// Whether the relay sent its end-of-stream sentinel.
    pub done: bool,
    pub error: Option<TurnError>,
}

enum Flow {
    Continue,
    Done,
    Fail(TurnError),
}

/// Reads the relay's downstream frames for one turn.
///
/// Each delta is appended to the accumulator, re-extracted, and the result
/// handed to the publisher. When the stream ends (sentinel, error event,
/// transport failure, or plain EOF) one final extraction pass runs.
pub struct TurnConsumer {
    buffer: LineBuffer,
    parser: EventParser<DownstreamTranscoder>,
    accumulator: TurnAccumulator,
}

impl TurnConsumer {
    pub fn new(turn: TurnId, extractor: ArtifactExtractor) -> Self {
        Self {
            buffer: LineBuffer::new(),
            parser: EventParser::downstream(),
            accumulator: TurnAccumulator::new(turn, extractor),
        }
    }

    pub async fn run<S, F>(
        mut self,
        stream: S,
        publisher: &mut ArtifactPublisher,
        mut on_delta: F,
    ) -> TurnOutcome
    where
        S: Stream<Item = Result<Bytes, TurnError>>,
        F: FnMut(&str),
    {
        let turn = self.accumulator.turn();
        let mut stream = std::pin::pin!(stream);
        let mut done = false;
        let mut error = None;

        'read: while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    tracing::warn!(turn_id = %turn, error = %e, "turn stream failed");
                    error = Some(e);
                    break;
                }
            };
            for line in self.buffer.feed(&chunk) {
                match self.handle_line(&line, publisher, &mut on_delta) {
                    Flow::Continue => {}
                    Flow::Done => {
                        done = true;
                        break 'read;
                    }
                    Flow::Fail(e) => {
                        error = Some(e);
                        break 'read;
                    }
                }
            }
        }

        if !done && error.is_none() {
            if let Some(line) = self.buffer.flush() {
                match self.handle_line(&line, publisher, &mut on_delta) {
                    Flow::Continue => {}
                    Flow::Done => done = true,
                    Flow::Fail(e) => error = Some(e),
                }
            }
        }

        self.conclude(publisher, done, error)
    }

    /// End a turn whose stream never opened (relay unreachable or refused).
    ///
    /// Runs the same final pass as [`run`](Self::run), so a preview left over
    /// from an earlier turn is cleared.
    pub fn abort(self, publisher: &mut ArtifactPublisher, error: TurnError) -> TurnOutcome {
        tracing::warn!(turn_id = %self.accumulator.turn(), error = %error, "turn failed to start");
        self.conclude(publisher, false, Some(error))
    }

    fn conclude(
        mut self,
        publisher: &mut ArtifactPublisher,
        done: bool,
        error: Option<TurnError>,
    ) -> TurnOutcome {
        let turn = self.accumulator.turn();
        let artifact = self.accumulator.finish().cloned();
        publisher.finish(turn, artifact.as_ref());
        tracing::debug!(
            turn_id = %turn,
            done,
            failed = error.is_some(),
            has_artifact = artifact.is_some(),
            "turn stream ended"
        );

        TurnOutcome {
            turn,
            text: self.accumulator.text().to_string(),
            artifact,
            done,
            error,
        }
    }

    fn handle_line<F: FnMut(&str)>(
        &mut self,
        line: &str,
        publisher: &mut ArtifactPublisher,
        on_delta: &mut F,
    ) -> Flow {
        match self.parser.parse(line) {
            Some(RelayEvent::Delta { text }) => {
                on_delta(&text);
                let turn = self.accumulator.turn();
                let latest = self.accumulator.push_delta(&text);
                publisher.update(turn, latest);
                Flow::Continue
            }
            Some(RelayEvent::Done) => Flow::Done,
            Some(RelayEvent::Error { message }) => Flow::Fail(TurnError::Remote(message)),
            Some(other) => {
                tracing::debug!(event = ?other, "ignoring relay event");
                Flow::Continue
            }
            None => Flow::Continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;
    use crate::publish::{Debouncer, TurnClock};

    struct Harness {
        clock: TurnClock,
        publisher: ArtifactPublisher,
        published: Arc<Mutex<Vec<String>>>,
    }

    fn harness() -> Harness {
        let clock = TurnClock::new();
        let published = Arc::new(Mutex::new(Vec::new()));
        let sink = published.clone();
        let debouncer = Debouncer::spawn(
            "artifact",
            Duration::from_millis(150),
            clock.clone(),
            move |_, body: String| sink.lock().unwrap().push(body),
        );
        Harness { clock, publisher: ArtifactPublisher::new(debouncer), published }
    }

    fn chunks(parts: &[&'static str]) -> impl Stream<Item = Result<Bytes, TurnError>> {
        let parts: Vec<Result<Bytes, TurnError>> =
            parts.iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))).collect();
        futures_util::stream::iter(parts)
    }

    fn consumer(turn: TurnId) -> TurnConsumer {
        TurnConsumer::new(turn, ArtifactExtractor::new("html").unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn deltas_accumulate_and_final_artifact_is_published() {
        let mut h = harness();
        let turn = h.clock.advance();
        let mut printed = String::new();

        let outcome = consumer(turn)
            .run(
                chunks(&[
                    "data: {\"text\":\"Here:\\n```ht\"}\n",
                    "\ndata: {\"text\":\"ml\\n<p>x</p>\\n```\"}\n\n",
                    "data: [DONE]\n\n",
                ]),
                &mut h.publisher,
                |d| printed.push_str(d),
            )
            .await;

        assert!(outcome.done);
        assert_eq!(outcome.error, None);
        assert_eq!(outcome.text, "Here:\n```html\n<p>x</p>\n```");
        assert_eq!(printed, outcome.text);
        assert_eq!(outcome.artifact.unwrap().body, "<p>x</p>");

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(*h.published.lock().unwrap(), vec!["<p>x</p>".to_string()]);
        h.publisher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn error_event_keeps_partial_text() {
        let mut h = harness();
        let turn = h.clock.advance();

        let outcome = consumer(turn)
            .run(
                chunks(&[
                    "data: {\"text\":\"partial\"}\n\n",
                    "data: {\"error\":\"Stream error from source\"}\n\n",
                    "data: {\"text\":\"ignored\"}\n\n",
                ]),
                &mut h.publisher,
                |_| {},
            )
            .await;

        assert!(!outcome.done);
        assert_eq!(outcome.text, "partial");
        assert_eq!(outcome.error, Some(TurnError::Remote("Stream error from source".into())));
        h.publisher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failure_ends_turn_with_error() {
        let mut h = harness();
        let turn = h.clock.advance();
        let stream = futures_util::stream::iter(vec![
            Ok(Bytes::from_static(b"data: {\"text\":\"a\"}\n\n")),
            Err(TurnError::Stream("reset".into())),
        ]);

        let outcome = consumer(turn).run(stream, &mut h.publisher, |_| {}).await;
        assert_eq!(outcome.text, "a");
        assert_eq!(outcome.error, Some(TurnError::Stream("reset".into())));
        h.publisher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn eof_without_sentinel_flushes_tail() {
        let mut h = harness();
        let turn = h.clock.advance();

        let outcome = consumer(turn)
            .run(chunks(&["data: {\"text\":\"a\"}\n\n", "data: {\"text\":\"b\"}"]), &mut h.publisher, |_| {})
            .await;

        assert!(!outcome.done);
        assert_eq!(outcome.error, None);
        assert_eq!(outcome.text, "ab");
        h.publisher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn unterminated_block_is_never_published() {
        let mut h = harness();
        let turn = h.clock.advance();

        let outcome = consumer(turn)
            .run(
                chunks(&["data: {\"text\":\"```html\\n<div>half\"}\n\n", "data: [DONE]\n\n"]),
                &mut h.publisher,
                |_| {},
            )
            .await;

        assert_eq!(outcome.artifact, None);
        h.publisher.shutdown().await;
        assert!(h.published.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_open_clears_previous_artifact() {
        let mut h = harness();

        let first = h.clock.advance();
        consumer(first)
            .run(
                chunks(&["data: {\"text\":\"```html\\n<p>A</p>\\n```\"}\n\n", "data: [DONE]\n\n"]),
                &mut h.publisher,
                |_| {},
            )
            .await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(*h.published.lock().unwrap(), vec!["<p>A</p>".to_string()]);

        let second = h.clock.advance();
        let status = TurnError::Status { status: 503, message: "busy".into() };
        let outcome = consumer(second).abort(&mut h.publisher, status.clone());

        assert_eq!(outcome.error, Some(status));
        assert_eq!(outcome.text, "");
        assert_eq!(outcome.artifact, None);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(
            *h.published.lock().unwrap(),
            vec!["<p>A</p>".to_string(), String::new()]
        );
        h.publisher.shutdown().await;
    }
}
