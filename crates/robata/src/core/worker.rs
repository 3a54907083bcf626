//! Module for handling long-running background tasks.

use std::sync::{Arc, atomic::{AtomicBool, Ordering}};
use tokio::{task::JoinHandle, sync::Notify};
use tracing::error;

/// A handle for managing a background task such as the batch collector or
/// the job reaper.
///
/// The task receives a running flag and a notifier. Stopping the handle
/// clears the flag and wakes the task through the notifier, so any task that
/// waits on `notifier.notified()` alongside its real work observes shutdown
/// promptly.
///
/// # Example
///
/// ```ignore
/// let worker = WorkerHandle::new(|running, notifier| {
///     tokio::spawn(async move {
///         while running.load(Ordering::SeqCst) {
///             tokio::select! {
///                 _ = notifier.notified() => break,
///                 _ = tokio::time::sleep(Duration::from_secs(5)) => {}
///             }
///         }
///     })
/// });
///
/// worker.stop().await;
/// ```
pub struct WorkerHandle {
    /// Flag indicating whether the background task should continue running
    running: Arc<AtomicBool>,

    /// Handle to the spawned background task, becomes `None` after shutdown is initiated
    handle: Option<JoinHandle<()>>,

    /// Notification mechanism used to wake the background task on shutdown
    notifier: Arc<Notify>,
}

impl WorkerHandle {
    /// Creates a new `WorkerHandle` by spawning a background task.
    ///
    /// # Parameters
    ///
    /// * `task` - A function that takes a running flag and a notifier, and returns a `JoinHandle`.
    ///   This function is responsible for creating and spawning the actual background task.
    pub fn new<F>(task: F) -> Self
    where
        F: FnOnce(Arc<AtomicBool>, Arc<Notify>) -> JoinHandle<()> + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let notifier = Arc::new(Notify::new());
        let handle = task(running.clone(), notifier.clone());

        Self {
            running,
            handle: Some(handle),
            notifier,
        }
    }

    /// Whether the task has been asked to keep running and has not exited.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
            && self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Signals the task to stop without waiting for it.
    ///
    /// Calling this more than once is harmless.
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.notifier.notify_one();
    }

    /// Signals the task to stop and waits until it has exited.
    pub async fn stop(mut self) {
        self.shutdown();
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    error!(error = %err, "Background task failed");
                }
            }
        }
    }
}

impl Drop for WorkerHandle {
    /// Ensures the background task is told to terminate when the handle is dropped.
    fn drop(&mut self) {
        self.shutdown();
    }
}
