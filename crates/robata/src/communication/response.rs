use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::request::Params;

/// What a [`Processor`](crate::Processor) produces for a successful request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Output {
    pub text: String,
    pub metadata: Params,
}

impl Output {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Params::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl From<String> for Output {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<&str> for Output {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

/// # Response
///
/// The outcome of exactly one [`Request`](crate::Request).
///
/// A response either carries an output or an error message, never both;
/// the constructors are the only way to build one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    request_id: Uuid,
    output: Option<String>,
    error: Option<String>,
    metadata: Params,
    duration: Duration,
}

impl Response {
    pub fn success(request_id: Uuid, output: Output, duration: Duration) -> Self {
        Self {
            request_id,
            output: Some(output.text),
            error: None,
            metadata: output.metadata,
            duration,
        }
    }

    pub fn failure(request_id: Uuid, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            request_id,
            output: None,
            error: Some(error.into()),
            metadata: Params::new(),
            duration,
        }
    }

    pub(crate) fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn metadata(&self) -> &Params {
        &self.metadata
    }

    /// Wall-clock time spent in the processor.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Splits the response into its output or its error message.
    pub fn into_result(self) -> Result<String, String> {
        match (self.output, self.error) {
            (_, Some(error)) => Err(error),
            (Some(output), None) => Ok(output),
            (None, None) => Ok(String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_carries_output_and_metadata() {
        let id = Uuid::new_v4();
        let response = Response::success(
            id,
            Output::new("done").with_metadata("tokens", 3),
            Duration::from_millis(5),
        );

        assert!(response.is_success());
        assert_eq!(response.request_id(), id);
        assert_eq!(response.output(), Some("done"));
        assert_eq!(response.error(), None);
        assert_eq!(response.metadata().get("tokens"), Some(&json!(3)));
        assert_eq!(response.into_result(), Ok("done".to_string()));
    }

    #[test]
    fn test_failure_has_error_and_no_output() {
        let response = Response::failure(Uuid::new_v4(), "model exploded", Duration::ZERO);

        assert!(!response.is_success());
        assert_eq!(response.output(), None);
        assert_eq!(response.error(), Some("model exploded"));
        assert_eq!(response.into_result(), Err("model exploded".to_string()));
    }
}
