use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::communication::{PendingRequest, Response};

/// Bookkeeping for requests that have been submitted but not yet answered.
///
/// An entry is inserted before its request is queued and removed, under the
/// same lock, by the first delivery for its id. Whoever removes the entry is
/// the only one allowed to resolve it, which makes delivery exactly-once.
#[derive(Default)]
pub(crate) struct ActiveRequests {
    entries: Mutex<HashMap<Uuid, PendingRequest>>,
}

impl ActiveRequests {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn register(&self, id: Uuid, pending: PendingRequest) {
        self.entries.lock().await.insert(id, pending);
    }

    /// Resolves the request the response belongs to.
    ///
    /// Returns `false` when the request was already delivered or was never
    /// registered; that case is a no-op.
    pub(crate) async fn deliver(&self, response: Response) -> bool {
        let id = response.request_id();
        let pending = self.entries.lock().await.remove(&id);

        match pending {
            Some(pending) => {
                pending.resolve(response);
                true
            }
            None => {
                debug!(request_id = %id, "Ignoring duplicate delivery");
                false
            }
        }
    }

    pub(crate) async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
