//! # Robata
//!
//! Asynchronous **request batching** and **job tracking** for applications
//! that hand work to slow, parallelizable backends such as model inference.
//!
//! ## Overview
//!
//! Callers submit requests without blocking. A background collector groups
//! queued requests into batches, bounded by size and by a time window, and
//! a dispatcher runs each request of a batch on a fixed number of worker
//! slots through a caller-supplied [`Processor`]. Every request is answered
//! exactly once, through its [`ResponseFuture`] and optional callback, even
//! when processing fails.
//!
//! Independently, a [`JobRegistry`] tracks long-running jobs through a
//! monotonic lifecycle and lets any caller block on a job's result with a
//! timeout.
//!
//! ## Architecture
//!
//! ### Requests
//!
//! ```text
//! submit_request ─► queue ─► collector ─► batch ─► dispatcher ─► worker slots
//!                                                                    │
//!                      future / callback ◄── delivery ◄── response ◄─┘
//! ```
//!
//! * The collector closes a batch once `max_batch_size` requests are gathered
//!   or `batch_timeout` has passed, whichever comes first. With batching
//!   disabled every request forms its own batch.
//! * Batches overlap: the collector never waits for a dispatched batch to
//!   finish. Completion order is not guaranteed, not even within a batch.
//! * A processor error or panic fails only the request it belongs to.
//!
//! ### Jobs
//!
//! Jobs move from `Pending` to `Running` to one of `Completed`, `Failed` or
//! `Cancelled` (or straight from `Pending` to `Cancelled`). Once terminal a
//! job never changes again, and its waiter is resolved exactly once.
//! Cancellation is cooperative: work in progress is not interrupted.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use robata::{
//!     BatchConfig, Engine, JobRegistry, Output, Params, ProcessingError, Request, processor_fn,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> robata::Result<()> {
//! let processor = processor_fn(|request: Request| async move {
//!     Ok::<_, ProcessingError>(Output::new(request.payload().to_uppercase()))
//! });
//! let engine = Engine::new(processor, BatchConfig::default(), Arc::new(JobRegistry::new()))?;
//! engine.start().await;
//!
//! let response = engine.submit_request("hello", Params::new(), None).await.await?;
//! assert_eq!(response.output(), Some("HELLO"));
//!
//! let job = engine.submit_tracked("world", Params::new()).await;
//! let result = engine.get_result(job, Duration::from_secs(5)).await?;
//! assert_eq!(result, "WORLD");
//!
//! engine.stop().await;
//! # Ok(())
//! # }
//! ```

mod batcher;
mod communication;
mod engine;

pub mod config;
pub mod core;
pub mod error;
pub mod jobs;

pub use batcher::Batcher;
pub use communication::{Callback, Output, Params, Request, Response, ResponseFuture};
pub use config::BatchConfig;
pub use crate::core::{FnProcessor, Processor, WorkerHandle, processor_fn};
pub use engine::Engine;
pub use error::{ConfigError, DeliveryError, Error, JobError, ProcessingError, RequestError, Result};
pub use jobs::{Job, JobOutcome, JobRegistry, JobStatus};
