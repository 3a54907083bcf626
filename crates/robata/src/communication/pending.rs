use std::panic::{catch_unwind, AssertUnwindSafe};

use tokio::sync::oneshot::Sender;
use tracing::{debug, error};

use super::request::Callback;
use super::response::Response;
use crate::error::{panic_message, DeliveryError};

/// # PendingRequest
///
/// The delivery half of a submitted request: the result slot the submitter
/// is awaiting and the optional callback to run alongside it.
///
/// Resolving consumes the value, so a pending request can be resolved at
/// most once.
pub(crate) struct PendingRequest {
    /// Channel for sending the response back to the submitter
    sender: Sender<Response>,

    /// Optional hook invoked with the response
    callback: Option<Callback>,
}

impl PendingRequest {
    pub(crate) fn new(sender: Sender<Response>, callback: Option<Callback>) -> Self {
        Self { sender, callback }
    }

    /// Fills the result slot, then runs the callback.
    ///
    /// A panicking callback is logged and swallowed. A submitter that stopped
    /// listening is not an error.
    pub(crate) fn resolve(self, response: Response) {
        let id = response.request_id();

        match self.callback {
            None => {
                if self.sender.send(response).is_err() {
                    debug!(request_id = %id, "Submitter dropped its response future");
                }
            }
            Some(callback) => {
                if self.sender.send(response.clone()).is_err() {
                    debug!(request_id = %id, "Submitter dropped its response future");
                }
                if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(&response))) {
                    let err = DeliveryError::CallbackPanicked {
                        id,
                        message: panic_message(payload.as_ref()),
                    };
                    error!(request_id = %id, "{err}");
                }
            }
        }
    }
}
