use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use tokio::sync::{Mutex, Semaphore, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::communication::{Callback, Params, PendingRequest, Request, Response, ResponseFuture};
use crate::config::BatchConfig;
use crate::core::batch::{BatchCollector, batching_loop};
use crate::core::delivery::ActiveRequests;
use crate::core::dispatch::Dispatcher;
use crate::core::handler::Processor;
use crate::core::worker::WorkerHandle;
use crate::error::Result;

/// # Batcher
///
/// Accepts requests without blocking, groups them into batches and runs them
/// on a bounded worker pool through a [`Processor`].
///
/// Requests submitted before [`start`](Self::start) are queued and picked up
/// once the collector runs. Stopping the batcher leaves queued requests in
/// place for a later restart; dropping it drops their result slots, which
/// their futures report as [`RequestError::Dropped`](crate::RequestError::Dropped).
pub struct Batcher<P: Processor> {
    config: BatchConfig,

    /// Sending half of the request queue
    sender: mpsc::UnboundedSender<Request>,

    /// Receiving half of the request queue, locked by the running collector
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<Request>>>,

    /// Requests submitted but not yet delivered
    active: Arc<ActiveRequests>,

    dispatcher: Dispatcher<P>,

    /// Handle to the collector task while it runs
    worker: Mutex<Option<WorkerHandle>>,
}

impl<P: Processor> Batcher<P> {
    /// Creates a stopped batcher. Fails if `config` does not validate.
    pub fn new(processor: P, config: BatchConfig) -> Result<Self> {
        config.validate()?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let active = Arc::new(ActiveRequests::new());
        let dispatcher = Dispatcher::new(
            Arc::new(processor),
            Arc::new(Semaphore::new(config.max_workers)),
            active.clone(),
            Arc::new(AtomicU64::new(0)),
        );

        Ok(Self {
            config,
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            active,
            dispatcher,
            worker: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Starts the collector. Does nothing if it is already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn start(&self) {
        let mut worker = self.worker.lock().await;
        if worker.as_ref().is_some_and(WorkerHandle::is_running) {
            debug!("Batcher already running");
            return;
        }
        if let Some(previous) = worker.take() {
            previous.stop().await;
        }

        let receiver = self.receiver.clone();
        let dispatcher = self.dispatcher.clone();
        let limit = self.config.effective_batch_size();
        let window = self.config.batch_timeout;

        *worker = Some(WorkerHandle::new(move |running, notifier| {
            tokio::spawn(async move {
                let receiver = receiver.lock_owned().await;
                let collector = BatchCollector::new(receiver, limit, window);
                batching_loop(collector, dispatcher, running, notifier).await;
            })
        }));
        info!(
            max_batch_size = self.config.max_batch_size,
            max_workers = self.config.max_workers,
            batching_enabled = self.config.batching_enabled,
            "Batcher started"
        );
    }

    /// Stops the collector and waits for it to exit. Does nothing if it is
    /// not running.
    ///
    /// Batches already dispatched keep running and still deliver.
    pub async fn stop(&self) {
        let worker = self.worker.lock().await.take();
        if let Some(worker) = worker {
            worker.stop().await;
            info!("Batcher stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.worker
            .lock()
            .await
            .as_ref()
            .is_some_and(WorkerHandle::is_running)
    }

    /// Queues a request and returns a future for its response.
    ///
    /// Never waits for processing. The future resolves, and `callback` runs,
    /// exactly once, including when processing fails.
    pub async fn submit_request(
        &self,
        payload: impl Into<String>,
        params: Params,
        callback: Option<Callback>,
    ) -> ResponseFuture {
        self.submit(Request::new(payload, params), callback).await
    }

    /// Queues an already built request, see [`submit_request`](Self::submit_request).
    pub async fn submit(&self, request: Request, callback: Option<Callback>) -> ResponseFuture {
        let id = request.id();
        let (tx, rx) = oneshot::channel();

        self.active.register(id, PendingRequest::new(tx, callback)).await;

        if let Err(mpsc::error::SendError(request)) = self.sender.send(request) {
            warn!(request_id = %id, "Request queue closed");
            let response =
                Response::failure(request.id(), "request queue closed", Default::default());
            self.active.deliver(response).await;
        } else {
            debug!(request_id = %id, "Queued request");
        }

        ResponseFuture::new(id, rx)
    }

    /// Number of requests submitted but not yet delivered.
    pub async fn pending_count(&self) -> usize {
        self.active.len().await
    }
}
