//! Error types for robata.

use std::any::Any;
use std::time::Duration;

use uuid::Uuid;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Request error: {0}")]
    Request(#[from] RequestError),
}

/// Configuration-related errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Failure reported by a [`Processor`](crate::Processor) for a single request.
///
/// Never escapes the worker pool: the dispatcher turns it into a failed
/// [`Response`](crate::Response) for the request that produced it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ProcessingError {
    message: String,
}

impl ProcessingError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for ProcessingError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ProcessingError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Failures raised while handing a response back to its submitter.
///
/// These are logged and swallowed, never propagated to the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Callback for request {id} panicked: {message}")]
    CallbackPanicked { id: Uuid, message: String },
}

/// Job-related errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JobError {
    #[error("Job {id} not found")]
    NotFound { id: Uuid },

    #[error("Job {id} did not finish within {timeout:?}")]
    Timeout { id: Uuid, timeout: Duration },

    #[error("Job {id} failed: {reason}")]
    Failed { id: Uuid, reason: String },

    #[error("Job {id} was cancelled")]
    Cancelled { id: Uuid },
}

/// Request-related errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("Request {id} was dropped before a response was delivered")]
    Dropped { id: Uuid },
}

/// Result type alias for robata.
pub type Result<T> = std::result::Result<T, Error>;

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
