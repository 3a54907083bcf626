use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tracing::debug;
use uuid::Uuid;

use crate::batcher::Batcher;
use crate::communication::{Callback, Params, ResponseFuture};
use crate::config::BatchConfig;
use crate::core::handler::Processor;
use crate::error::{JobError, Result};
use crate::jobs::{Job, JobRegistry, JobStatus};

/// # Engine
///
/// The surface the owning application talks to: a [`Batcher`] for requests
/// and an injected [`JobRegistry`] for jobs.
///
/// The registry is shared, so several engines (or other components) may
/// track jobs in the same place.
pub struct Engine<P: Processor> {
    batcher: Batcher<P>,
    jobs: Arc<JobRegistry>,
}

impl<P: Processor> Engine<P> {
    pub fn new(processor: P, config: BatchConfig, jobs: Arc<JobRegistry>) -> Result<Self> {
        Ok(Self {
            batcher: Batcher::new(processor, config)?,
            jobs,
        })
    }

    pub fn batcher(&self) -> &Batcher<P> {
        &self.batcher
    }

    pub fn jobs(&self) -> &Arc<JobRegistry> {
        &self.jobs
    }

    pub async fn start(&self) {
        self.batcher.start().await;
    }

    pub async fn stop(&self) {
        self.batcher.stop().await;
    }

    pub async fn submit_request(
        &self,
        payload: impl Into<String>,
        params: Params,
        callback: Option<Callback>,
    ) -> ResponseFuture {
        self.batcher.submit_request(payload, params, callback).await
    }

    pub async fn create_job(&self, metadata: Params) -> Uuid {
        self.jobs.create(metadata).await
    }

    pub async fn update_progress(&self, id: Uuid, progress: f64, status: Option<JobStatus>) {
        self.jobs.update_progress(id, progress, status).await;
    }

    pub async fn complete_job(&self, id: Uuid, result: Value) -> bool {
        self.jobs.complete(id, result).await
    }

    pub async fn fail_job(&self, id: Uuid, error: impl Into<String>) -> bool {
        self.jobs.fail(id, error).await
    }

    pub async fn cancel_job(&self, id: Uuid) -> bool {
        self.jobs.cancel(id).await
    }

    pub async fn get_status(&self, id: Uuid) -> Option<Job> {
        self.jobs.get_status(id).await
    }

    pub async fn get_result(
        &self,
        id: Uuid,
        timeout: Duration,
    ) -> std::result::Result<Value, JobError> {
        self.jobs.get_result(id, timeout).await
    }

    pub async fn cleanup_old_jobs(&self, max_age: Duration) -> usize {
        self.jobs.cleanup(max_age).await
    }

    /// Submits a request and tracks it as a job.
    ///
    /// The job is `Running` once the request is queued and is completed with
    /// the response output, or failed with its error. A job cancelled in the
    /// meantime keeps its cancelled status.
    pub async fn submit_tracked(&self, payload: impl Into<String>, params: Params) -> Uuid {
        let payload = payload.into();
        let id = self
            .jobs
            .create(Params::from_iter([("payload".to_string(), json!(payload))]))
            .await;
        self.jobs.update_progress(id, 0.0, Some(JobStatus::Running)).await;

        let response = self.batcher.submit_request(payload, params, None).await;
        let jobs = self.jobs.clone();
        tokio::spawn(async move {
            let recorded = match response.await {
                Ok(response) => match response.into_result() {
                    Ok(output) => jobs.complete(id, Value::String(output)).await,
                    Err(error) => jobs.fail(id, error).await,
                },
                Err(err) => jobs.fail(id, err.to_string()).await,
            };
            if !recorded {
                debug!(job_id = %id, "Dropped response for finished job");
            }
        });

        id
    }
}
