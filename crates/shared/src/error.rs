use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by a data provider. The cause is carried verbatim into
/// the model's `Error` state.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{cause}")]
pub struct FetchError {
    pub cause: String,
}

impl FetchError {
    pub fn new(cause: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
        }
    }

    pub fn cause(&self) -> &str {
        &self.cause
    }
}

impl From<String> for FetchError {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for FetchError {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionError {
    #[error("model action '{action}' is not supported")]
    Unsupported { action: String },
}
