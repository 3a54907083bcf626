use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{Notify, OwnedMutexGuard};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info};

use super::dispatch::Dispatcher;
use super::handler::Processor;
use crate::communication::Request;

/// Upper bound on the buffer reserved up front for one window.
const INITIAL_BATCH_CAPACITY: usize = 64;

/// Exclusive access to the request queue, held by the running collector.
pub(crate) type QueueReceiver = OwnedMutexGuard<UnboundedReceiver<Request>>;

/// Result of one collection window.
pub(crate) struct Window {
    /// Requests in arrival order; may be empty
    pub(crate) batch: Vec<Request>,

    /// Set when the collector should exit after dispatching `batch`
    pub(crate) stop: bool,
}

enum Event {
    Request(Request),
    Elapsed,
    Closed,
    Shutdown,
}

/// Drains the request queue into batches bounded by size and time.
pub(crate) struct BatchCollector {
    receiver: QueueReceiver,
    limit: usize,
    window: Duration,
    /// A request received while idle, opening the next window
    carry: Option<Request>,
}

impl BatchCollector {
    pub(crate) fn new(receiver: QueueReceiver, limit: usize, window: Duration) -> Self {
        Self {
            receiver,
            limit: limit.max(1),
            window,
            carry: None,
        }
    }

    /// Collects requests until `limit` are gathered or the window elapses.
    ///
    /// Requests already queued are always taken, even with a zero window.
    /// While the queue is empty the collector waits on it, bounded by the
    /// remaining window, and wakes early on shutdown.
    pub(crate) async fn next_batch(&mut self, shutdown: &Notify) -> Window {
        let deadline = Instant::now() + self.window;
        let mut batch = Vec::with_capacity(self.limit.min(INITIAL_BATCH_CAPACITY));
        batch.extend(self.carry.take());

        while batch.len() < self.limit {
            match self.receiver.try_recv() {
                Ok(request) => {
                    batch.push(request);
                    continue;
                }
                Err(TryRecvError::Disconnected) => return Window { batch, stop: true },
                Err(TryRecvError::Empty) => {}
            }

            if Instant::now() >= deadline {
                break;
            }

            let event = tokio::select! {
                biased;
                _ = shutdown.notified() => Event::Shutdown,
                received = timeout_at(deadline, self.receiver.recv()) => match received {
                    Ok(Some(request)) => Event::Request(request),
                    Ok(None) => Event::Closed,
                    Err(_) => Event::Elapsed,
                },
            };

            match event {
                Event::Request(request) => batch.push(request),
                Event::Elapsed => break,
                Event::Closed | Event::Shutdown => return Window { batch, stop: true },
            }
        }

        Window { batch, stop: false }
    }

    /// Parks until a request arrives or shutdown is signalled.
    ///
    /// Returns `false` when the collector should exit.
    pub(crate) async fn wait_for_work(&mut self, shutdown: &Notify) -> bool {
        tokio::select! {
            biased;
            _ = shutdown.notified() => false,
            received = self.receiver.recv() => match received {
                Some(request) => {
                    self.carry = Some(request);
                    true
                }
                None => false,
            },
        }
    }

    fn take_carry(&mut self) -> Option<Request> {
        self.carry.take()
    }
}

/// The collector loop: form a batch, hand it to the dispatcher, repeat.
///
/// Dispatch does not wait for the batch to finish, so the next window opens
/// immediately. Empty windows are skipped and the loop parks on the queue
/// instead of spinning.
pub(crate) async fn batching_loop<P: Processor>(
    mut collector: BatchCollector,
    dispatcher: Dispatcher<P>,
    running: Arc<AtomicBool>,
    notifier: Arc<Notify>,
) {
    info!(batch_size = collector.limit, window = ?collector.window, "Batch collector started");

    while running.load(Ordering::SeqCst) {
        let Window { batch, stop } = collector.next_batch(&notifier).await;

        if batch.is_empty() {
            if stop || !collector.wait_for_work(&notifier).await {
                break;
            }
            continue;
        }

        debug!(size = batch.len(), "Formed batch");
        dispatcher.dispatch(batch);

        if stop {
            break;
        }
    }

    if let Some(request) = collector.take_carry() {
        dispatcher.dispatch(vec![request]);
    }

    info!("Batch collector stopped");
}
