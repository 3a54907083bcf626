use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::response::Response;

/// Open key-value map carried alongside requests, responses and jobs.
pub type Params = Map<String, Value>;

/// Invoked once with the response of the request it was submitted with.
pub type Callback = Box<dyn FnOnce(&Response) + Send + 'static>;

/// # Request
///
/// A single unit of work submitted to the [`Batcher`](crate::Batcher).
///
/// The payload and parameters are never interpreted by the batcher; they are
/// handed to the [`Processor`](crate::Processor) as-is, together with the
/// context map.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    id: Uuid,
    payload: String,
    params: Params,
    context: Params,
    created_at: DateTime<Utc>,
}

impl Request {
    /// Creates a request with a freshly generated id.
    pub fn new(payload: impl Into<String>, params: Params) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload: payload.into(),
            params,
            context: Params::new(),
            created_at: Utc::now(),
        }
    }

    /// Attaches a context map that is passed through to the processor unmodified.
    pub fn with_context(mut self, context: Params) -> Self {
        self.context = context;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn context(&self) -> &Params {
        &self.context
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
