//! # Batching Core
//!
//! The moving parts behind [`Batcher`](crate::Batcher).
//!
//! ## Module Structure
//!
//! * [`batch`] - The collector: drains the request queue into batches bounded by
//!   size and time, and the loop that feeds those batches to the dispatcher.
//!
//! * [`dispatch`] - Runs every request of a batch as its own task on a fixed
//!   number of worker slots, converting processor errors and panics into
//!   failed responses.
//!
//! * [`delivery`] - Bookkeeping for in-flight requests and exactly-once
//!   resolution of their futures and callbacks.
//!
//! * [`handler`] - The [`Processor`] trait implemented by callers.
//!
//! * [`worker`] - Background task management. The [`WorkerHandle`] type offers
//!   a convenient interface for spawning and gracefully stopping long-running
//!   tasks.
//!
pub(crate) mod batch;
pub(crate) mod delivery;
pub mod dispatch;
pub mod handler;
pub mod worker;

pub use handler::{FnProcessor, Processor, processor_fn};
pub use worker::WorkerHandle;
