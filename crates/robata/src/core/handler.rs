use std::future::Future;

use async_trait::async_trait;

use crate::communication::{Output, Request};
use crate::error::ProcessingError;

/// The work performed for a single request.
///
/// Implementations are called concurrently from the worker pool, once per
/// request. Returning an error, or panicking, only fails the request being
/// processed.
///
/// # Example
///
/// ```ignore
/// struct Echo;
///
/// #[async_trait]
/// impl Processor for Echo {
///     async fn process(&self, request: &Request) -> Result<Output, ProcessingError> {
///         Ok(Output::new(request.payload()))
///     }
/// }
/// ```
#[async_trait]
pub trait Processor: Send + Sync + 'static {
    async fn process(&self, request: &Request) -> Result<Output, ProcessingError>;
}

/// A [`Processor`] backed by an async closure.
pub struct FnProcessor<F> {
    f: F,
}

/// Wraps an async closure taking an owned [`Request`] as a [`Processor`].
pub fn processor_fn<F, Fut>(f: F) -> FnProcessor<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Output, ProcessingError>> + Send + 'static,
{
    FnProcessor { f }
}

#[async_trait]
impl<F, Fut> Processor for FnProcessor<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Output, ProcessingError>> + Send + 'static,
{
    async fn process(&self, request: &Request) -> Result<Output, ProcessingError> {
        (self.f)(request.clone()).await
    }
}
