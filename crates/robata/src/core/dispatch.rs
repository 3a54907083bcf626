use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::delivery::ActiveRequests;
use super::handler::Processor;
use crate::communication::{Request, Response};
use crate::error::panic_message;

/// Metadata key holding the sequence number of the batch a response came from.
pub const BATCH_ID_KEY: &str = "batch_id";

/// Metadata key holding the size of the batch a response came from.
pub const BATCH_SIZE_KEY: &str = "batch_size";

/// Runs formed batches on a fixed number of worker slots.
///
/// Every request becomes its own task; the tasks of one batch contend for
/// the same slots as those of any other batch still in flight, so batches
/// overlap and completion order is unspecified.
pub(crate) struct Dispatcher<P> {
    processor: Arc<P>,
    slots: Arc<Semaphore>,
    active: Arc<ActiveRequests>,
    batches: Arc<AtomicU64>,
}

impl<P> Clone for Dispatcher<P> {
    fn clone(&self) -> Self {
        Self {
            processor: self.processor.clone(),
            slots: self.slots.clone(),
            active: self.active.clone(),
            batches: self.batches.clone(),
        }
    }
}

impl<P: Processor> Dispatcher<P> {
    pub(crate) fn new(
        processor: Arc<P>,
        slots: Arc<Semaphore>,
        active: Arc<ActiveRequests>,
        batches: Arc<AtomicU64>,
    ) -> Self {
        Self {
            processor,
            slots,
            active,
            batches,
        }
    }

    /// Spawns one unit of work per request and returns without waiting.
    pub(crate) fn dispatch(&self, batch: Vec<Request>) -> Vec<JoinHandle<()>> {
        let batch_id = self.batches.fetch_add(1, Ordering::SeqCst);
        let batch_size = batch.len();
        debug!(batch_id, batch_size, "Dispatching batch");

        batch
            .into_iter()
            .map(|request| {
                let processor = self.processor.clone();
                let slots = self.slots.clone();
                let active = self.active.clone();

                tokio::spawn(async move {
                    // The semaphore is never closed, so this only waits for a free slot.
                    let _permit = slots.acquire_owned().await.ok();
                    let response = run_unit(processor.as_ref(), &request)
                        .await
                        .with_metadata(BATCH_ID_KEY, batch_id)
                        .with_metadata(BATCH_SIZE_KEY, batch_size as u64);
                    active.deliver(response).await;
                })
            })
            .collect()
    }
}

/// Processes one request, turning errors and panics into a failed response.
pub(crate) async fn run_unit<P: Processor>(processor: &P, request: &Request) -> Response {
    let id = request.id();
    let started = Instant::now();
    let outcome = AssertUnwindSafe(processor.process(request))
        .catch_unwind()
        .await;
    let elapsed = started.elapsed();

    match outcome {
        Ok(Ok(output)) => Response::success(id, output, elapsed),
        Ok(Err(err)) => {
            debug!(request_id = %id, error = %err, "Processing failed");
            Response::failure(id, err.message(), elapsed)
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(request_id = %id, "Processor panicked: {message}");
            Response::failure(id, format!("processor panicked: {message}"), elapsed)
        }
    }
}
