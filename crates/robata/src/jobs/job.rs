//! Job records and their state machine.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::communication::Params;
use crate::error::JobError;

/// State of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is waiting to be started.
    Pending,
    /// Job is currently being worked on.
    Running,
    /// Job finished with a result.
    Completed,
    /// Job finished with an error.
    Failed,
    /// Job was cancelled before it finished.
    Cancelled,
}

impl JobStatus {
    /// Check if this state allows transitioning to another state.
    ///
    /// Completing or failing a pending job is allowed and counts as passing
    /// through `Running`.
    pub fn can_transition_to(&self, target: JobStatus) -> bool {
        use JobStatus::*;

        matches!(
            (self, target),
            (Pending, Running)
                | (Pending, Completed)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed(Value),
    Failed(String),
    Cancelled,
}

impl JobOutcome {
    pub fn into_result(self, id: Uuid) -> Result<Value, JobError> {
        match self {
            Self::Completed(value) => Ok(value),
            Self::Failed(reason) => Err(JobError::Failed { id, reason }),
            Self::Cancelled => Err(JobError::Cancelled { id }),
        }
    }
}

/// Snapshot of a tracked job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    /// Percentage in `[0, 100]`.
    pub progress: f64,
    /// Set only once the job is completed.
    pub result: Option<Value>,
    /// Set only once the job has failed.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: Params,
}

impl Job {
    pub(crate) fn new(metadata: Params) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            progress: 0.0,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            metadata,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The stored outcome, if the job has reached a terminal status.
    pub fn outcome(&self) -> Option<JobOutcome> {
        match self.status {
            JobStatus::Completed => Some(JobOutcome::Completed(
                self.result.clone().unwrap_or(Value::Null),
            )),
            JobStatus::Failed => Some(JobOutcome::Failed(self.error.clone().unwrap_or_default())),
            JobStatus::Cancelled => Some(JobOutcome::Cancelled),
            JobStatus::Pending | JobStatus::Running => None,
        }
    }

    /// Time since the last update, zero if the clock went backwards.
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        (now - self.updated_at).to_std().unwrap_or(Duration::ZERO)
    }
}
