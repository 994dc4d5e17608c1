use serde::{Deserialize, Serialize};

use crate::error::{ActionError, FetchError};

/// Current state published by a model. Exactly one value is current at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ModelState<T> {
    #[default]
    Empty,
    /// A fetch is in flight. The previously shown page is not retained.
    Loading,
    /// The page returned by the most recent successful fetch.
    Ready(Vec<T>),
    Error(FetchError),
}

impl<T> ModelState<T> {
    pub fn kind(&self) -> &'static str {
        match self {
            ModelState::Empty => "empty",
            ModelState::Loading => "loading",
            ModelState::Ready(_) => "ready",
            ModelState::Error(_) => "error",
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, ModelState::Loading)
    }

    pub fn items(&self) -> Option<&[T]> {
        match self {
            ModelState::Ready(items) => Some(items),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            ModelState::Error(error) => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "item", rename_all = "snake_case")]
pub enum ModelAction<T> {
    Upsert(T),
    Delete(T),
}

impl<T> ModelAction<T> {
    pub fn kind(&self) -> &'static str {
        match self {
            ModelAction::Upsert(_) => "upsert",
            ModelAction::Delete(_) => "delete",
        }
    }

    pub fn item(&self) -> &T {
        match self {
            ModelAction::Upsert(item) | ModelAction::Delete(item) => item,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "error", rename_all = "snake_case")]
pub enum ModelActionResult {
    Complete,
    Failed(ActionError),
}

impl ModelActionResult {
    pub fn unsupported(action: &str) -> Self {
        ModelActionResult::Failed(ActionError::Unsupported {
            action: action.to_string(),
        })
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, ModelActionResult::Complete)
    }
}
