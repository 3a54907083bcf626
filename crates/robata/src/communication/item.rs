use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use uuid::Uuid;

use super::response::Response;
use crate::error::RequestError;

/// # ResponseFuture
///
/// Resolves to the [`Response`] of a submitted request.
///
/// Wraps the receiving half of the request's result slot. It yields
/// [`RequestError::Dropped`] only if the batcher was torn down before the
/// request was delivered.
#[derive(Debug)]
pub struct ResponseFuture {
    /// Id of the request this future belongs to
    request_id: Uuid,

    /// The underlying channel receiver
    receiver: oneshot::Receiver<Response>,
}

impl ResponseFuture {
    pub(crate) fn new(request_id: Uuid, receiver: oneshot::Receiver<Response>) -> Self {
        Self {
            request_id,
            receiver,
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }
}

impl Future for ResponseFuture {
    type Output = Result<Response, RequestError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let id = this.request_id;
        Pin::new(&mut this.receiver)
            .poll(cx)
            .map(|received| received.map_err(|_| RequestError::Dropped { id }))
    }
}
