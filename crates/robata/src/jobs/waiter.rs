use std::time::Duration;

use tokio::sync::watch;

use super::job::JobOutcome;

/// Single-resolution completion signal for one job.
///
/// Any number of callers may subscribe and wait; the first resolution wins
/// and every later attempt is ignored.
#[derive(Debug)]
pub(crate) struct Waiter {
    sender: watch::Sender<Option<JobOutcome>>,
}

pub(crate) enum WaitError {
    /// No outcome before the deadline
    Elapsed,
    /// The waiter was dropped unresolved
    Closed,
}

impl Waiter {
    pub(crate) fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self { sender }
    }

    /// Stores the outcome unless one is already stored. Returns whether this
    /// call resolved the waiter.
    pub(crate) fn resolve(&self, outcome: JobOutcome) -> bool {
        self.sender.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(outcome);
            true
        })
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Option<JobOutcome>> {
        self.sender.subscribe()
    }
}

/// Waits on a subscription for up to `timeout`.
pub(crate) async fn wait(
    mut receiver: watch::Receiver<Option<JobOutcome>>,
    timeout: Duration,
) -> Result<JobOutcome, WaitError> {
    match tokio::time::timeout(timeout, receiver.wait_for(Option::is_some)).await {
        Ok(Ok(outcome)) => outcome.clone().ok_or(WaitError::Closed),
        Ok(Err(_)) => Err(WaitError::Closed),
        Err(_) => Err(WaitError::Elapsed),
    }
}
