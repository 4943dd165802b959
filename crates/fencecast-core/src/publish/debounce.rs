use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use fencecast_types::artifact::TurnId;

/// Identity of the turn currently allowed to publish.
///
/// Shared between the turn driver and every debouncer; a delivery stamped
/// with any other turn is dropped.
#[derive(Debug, Clone, Default)]
pub struct TurnClock {
    current: Arc<AtomicU64>,
}

impl TurnClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> TurnId {
        TurnId(self.current.load(Ordering::SeqCst))
    }

    /// Move to a new turn, making everything scheduled so far stale.
    pub fn advance(&self) -> TurnId {
        TurnId(self.current.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, turn: TurnId) -> bool {
        self.current() == turn
    }
}

/// Trailing-edge debouncer.
///
/// Every [`publish`](Self::publish) restarts the quiescence window and
/// replaces the pending value; when the window elapses without a newer
/// value, the pending one is delivered. Intermediate values are never
/// observed. The pending value is also delivered when the debouncer shuts
/// down, so the last value is never lost.
#[derive(Debug)]
pub struct Debouncer<T> {
    tx: mpsc::UnboundedSender<(TurnId, T)>,
    task: JoinHandle<()>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn spawn<F>(name: &'static str, window: Duration, clock: TurnClock, deliver: F) -> Self
    where
        F: FnMut(TurnId, T) + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(name, window, clock, rx, deliver));
        Self { tx, task }
    }

    /// Schedule `value`, superseding anything still pending.
    pub fn publish(&self, turn: TurnId, value: T) {
        send(&self.tx, turn, value);
    }

    /// A cloneable handle that publishes into this debouncer.
    ///
    /// The debouncer only stops once every sender is gone.
    pub fn sender(&self) -> DebounceSender<T> {
        DebounceSender { tx: self.tx.clone() }
    }

    /// Deliver whatever is pending and stop.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "debouncer task failed");
        }
    }
}

/// Publishing side of a [`Debouncer`], for use inside another debouncer's
/// delivery callback.
#[derive(Debug)]
pub struct DebounceSender<T> {
    tx: mpsc::UnboundedSender<(TurnId, T)>,
}

impl<T> Clone for DebounceSender<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<T> DebounceSender<T> {
    pub fn publish(&self, turn: TurnId, value: T) {
        send(&self.tx, turn, value);
    }
}

fn send<T>(tx: &mpsc::UnboundedSender<(TurnId, T)>, turn: TurnId, value: T) {
    if tx.send((turn, value)).is_err() {
        tracing::debug!(turn_id = %turn, "debouncer already stopped");
    }
}

async fn run<T, F>(
    name: &'static str,
    window: Duration,
    clock: TurnClock,
    mut rx: mpsc::UnboundedReceiver<(TurnId, T)>,
    mut deliver: F,
) where
    F: FnMut(TurnId, T),
{
    let mut deliver_current = move |turn: TurnId, value: T| {
        if clock.is_current(turn) {
            deliver(turn, value);
        } else {
            tracing::trace!(debouncer = name, turn_id = %turn, "dropping stale delivery");
        }
    };

    let mut pending: Option<(TurnId, T)> = None;
    loop {
        let Some((turn, value)) = pending.take() else {
            match rx.recv().await {
                Some(next) => pending = Some(next),
                None => break,
            }
            continue;
        };

        tokio::select! {
            next = rx.recv() => match next {
                Some(next) => pending = Some(next),
                None => {
                    deliver_current(turn, value);
                    break;
                }
            },
            _ = tokio::time::sleep(window) => deliver_current(turn, value),
        }
    }
}
