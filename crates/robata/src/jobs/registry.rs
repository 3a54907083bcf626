use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::job::{Job, JobOutcome, JobStatus};
use super::waiter::{WaitError, Waiter, wait};
use crate::communication::Params;
use crate::core::worker::WorkerHandle;
use crate::error::JobError;

struct Entry {
    job: Job,
    waiter: Waiter,
}

/// # JobRegistry
///
/// Tracks long-running jobs from creation to a terminal status.
///
/// Every mutation goes through one registry-wide lock. Callers only ever see
/// cloned [`Job`] snapshots. Operations on unknown ids are logged and ignored
/// rather than reported as errors, except for [`get_result`](Self::get_result),
/// whose caller needs an answer.
///
/// Build one per application (or per test) and share it behind an [`Arc`].
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<Uuid, Entry>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new pending job and returns its id.
    pub async fn create(&self, metadata: Params) -> Uuid {
        let job = Job::new(metadata);
        let id = job.id;
        self.jobs.lock().await.insert(
            id,
            Entry {
                job,
                waiter: Waiter::new(),
            },
        );
        info!(job_id = %id, "Created job");
        id
    }

    /// Records progress, clamped to `[0, 100]`, and optionally moves a
    /// pending job to `Running`.
    ///
    /// Requesting any other status is ignored with a warning; terminal
    /// statuses are reached through [`complete`](Self::complete),
    /// [`fail`](Self::fail) and [`cancel`](Self::cancel).
    pub async fn update_progress(&self, id: Uuid, progress: f64, status: Option<JobStatus>) {
        let mut jobs = self.jobs.lock().await;
        let Some(entry) = jobs.get_mut(&id) else {
            warn!(job_id = %id, "{}", JobError::NotFound { id });
            return;
        };
        let job = &mut entry.job;

        if job.is_terminal() {
            warn!(job_id = %id, status = %job.status, "Ignoring progress update for finished job");
            return;
        }

        job.progress = if progress.is_nan() { job.progress } else { progress.clamp(0.0, 100.0) };
        job.updated_at = Utc::now();

        match status {
            None => {}
            Some(JobStatus::Running) if job.status == JobStatus::Running => {}
            Some(JobStatus::Running) => {
                job.status = JobStatus::Running;
                debug!(job_id = %id, "Job running");
            }
            Some(other) => {
                warn!(
                    job_id = %id,
                    status = %job.status,
                    requested = %other,
                    "Ignoring status change in progress update"
                );
            }
        }
    }

    /// Completes the job with `result`. Returns whether the job was changed.
    pub async fn complete(&self, id: Uuid, result: Value) -> bool {
        self.finish(id, JobOutcome::Completed(result)).await
    }

    /// Fails the job with `error`. Returns whether the job was changed.
    pub async fn fail(&self, id: Uuid, error: impl Into<String>) -> bool {
        self.finish(id, JobOutcome::Failed(error.into())).await
    }

    /// Cancels a pending or running job.
    ///
    /// Returns `false` when the id is unknown or the job already finished.
    /// Cancellation does not interrupt work in progress; processors that care
    /// should poll [`get_status`](Self::get_status).
    pub async fn cancel(&self, id: Uuid) -> bool {
        self.finish(id, JobOutcome::Cancelled).await
    }

    async fn finish(&self, id: Uuid, outcome: JobOutcome) -> bool {
        let target = match &outcome {
            JobOutcome::Completed(_) => JobStatus::Completed,
            JobOutcome::Failed(_) => JobStatus::Failed,
            JobOutcome::Cancelled => JobStatus::Cancelled,
        };

        let mut jobs = self.jobs.lock().await;
        let Some(Entry { job, waiter }) = jobs.get_mut(&id) else {
            warn!(job_id = %id, "{}", JobError::NotFound { id });
            return false;
        };

        if !job.status.can_transition_to(target) {
            warn!(
                job_id = %id,
                status = %job.status,
                requested = %target,
                "Ignoring transition of finished job"
            );
            return false;
        }

        match &outcome {
            JobOutcome::Completed(result) => {
                job.progress = 100.0;
                job.result = Some(result.clone());
            }
            JobOutcome::Failed(reason) => job.error = Some(reason.clone()),
            JobOutcome::Cancelled => {}
        }
        job.status = target;
        job.updated_at = Utc::now();
        waiter.resolve(outcome);

        info!(job_id = %id, status = %target, "Job finished");
        true
    }

    /// Snapshot of the job, if it is still tracked.
    pub async fn get_status(&self, id: Uuid) -> Option<Job> {
        self.jobs.lock().await.get(&id).map(|entry| entry.job.clone())
    }

    /// The job's result, waiting up to `timeout` for it to finish.
    ///
    /// A finished job answers immediately from its stored outcome. The wait
    /// happens outside the registry lock.
    pub async fn get_result(&self, id: Uuid, timeout: Duration) -> Result<Value, JobError> {
        let receiver = {
            let jobs = self.jobs.lock().await;
            let entry = jobs.get(&id).ok_or(JobError::NotFound { id })?;
            if let Some(outcome) = entry.job.outcome() {
                return outcome.into_result(id);
            }
            entry.waiter.subscribe()
        };

        match wait(receiver, timeout).await {
            Ok(outcome) => outcome.into_result(id),
            Err(WaitError::Elapsed) => Err(JobError::Timeout { id, timeout }),
            Err(WaitError::Closed) => Err(JobError::NotFound { id }),
        }
    }

    /// Evicts finished jobs not updated for at least `max_age`. Pending and
    /// running jobs are never evicted. Returns how many were removed.
    pub async fn cleanup(&self, max_age: Duration) -> usize {
        let now = Utc::now();
        let mut jobs = self.jobs.lock().await;
        let before = jobs.len();
        jobs.retain(|_, entry| !(entry.job.is_terminal() && entry.job.idle_for(now) >= max_age));
        let evicted = before - jobs.len();
        if evicted > 0 {
            debug!(evicted, "Cleaned up finished jobs");
        }
        evicted
    }

    /// Snapshots of all jobs, optionally only those with `status`.
    pub async fn list(&self, status: Option<JobStatus>) -> Vec<Job> {
        self.jobs
            .lock()
            .await
            .values()
            .filter(|entry| status.is_none_or(|status| entry.job.status == status))
            .map(|entry| entry.job.clone())
            .collect()
    }

    /// Number of tracked jobs per status.
    pub async fn counts(&self) -> HashMap<JobStatus, usize> {
        let mut counts = HashMap::new();
        for entry in self.jobs.lock().await.values() {
            *counts.entry(entry.job.status).or_insert(0) += 1;
        }
        counts
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }

    /// Runs [`cleanup`](Self::cleanup) every `interval` until the returned
    /// handle is stopped or dropped.
    pub fn spawn_reaper(self: &Arc<Self>, interval: Duration, max_age: Duration) -> WorkerHandle {
        let registry = self.clone();
        WorkerHandle::new(move |running, notifier| {
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                while running.load(Ordering::SeqCst) {
                    tokio::select! {
                        biased;
                        _ = notifier.notified() => break,
                        _ = ticker.tick() => {}
                    }
                    registry.cleanup(max_age).await;
                }
            })
        })
    }
}
