//! Job tracking: independently identifiable units of long-running work.
//!
//! * `job` - [`Job`] snapshots and the [`JobStatus`] state machine
//!   (Pending → Running → Completed/Failed/Cancelled, or Pending → Cancelled).
//! * `waiter` - the single-resolution signal each job carries.
//! * `registry` - [`JobRegistry`], the lifecycle operations over all jobs.

mod job;
mod registry;
mod waiter;

pub use job::{Job, JobOutcome, JobStatus};
pub use registry::JobRegistry;
