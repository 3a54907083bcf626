mod item;
mod pending;
mod request;
mod response;

pub use item::ResponseFuture;
pub(crate) use pending::PendingRequest;
pub use request::{Callback, Params, Request};
pub use response::{Output, Response};
