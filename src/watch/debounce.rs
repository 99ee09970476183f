// src/watch/debounce.rs

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Collapses bursts of raw filesystem events into single change signals.
///
/// Every observed event (re)arms a deadline one debounce interval in the
/// future; when the deadline elapses with no further events, the change
/// callback fires exactly once for the whole burst. Dropping the debouncer
/// cancels a pending window without firing it.
pub struct Debouncer {
    raw_tx: mpsc::UnboundedSender<()>,
    task: JoinHandle<()>,
}

impl Debouncer {
    /// Start the debounce task. Must be called from within a tokio runtime.
    pub fn new(interval: Duration, on_change: impl Fn() + Send + 'static) -> Self {
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<()>();

        let task = tokio::spawn(async move {
            let mut deadline: Option<Instant> = None;
            loop {
                tokio::select! {
                    raw = raw_rx.recv() => match raw {
                        Some(()) => deadline = Some(Instant::now() + interval),
                        // Channel closed: teardown. A pending window is
                        // discarded, not fired.
                        None => break,
                    },
                    _ = sleep_until_deadline(deadline), if deadline.is_some() => {
                        deadline = None;
                        debug!("debounce window elapsed; emitting change signal");
                        on_change();
                    }
                }
            }
            debug!("debounce task ended");
        });

        Self { raw_tx, task }
    }

    /// Record one raw filesystem event.
    pub fn observe_event(&self) {
        let _ = self.raw_tx.send(());
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
