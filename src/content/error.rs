//! Content engine error types.

use crate::error::KeelsonError;
use thiserror::Error;

/// Errors from content schema operations.
#[derive(Debug, Error)]
pub enum ContentError {
    /// Input violates a schema, uniqueness, coercion or reference rule.
    /// The message is safe to show to the end user.
    #[error("{0}")]
    Validation(String),

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity, e.g. "Content type".
        entity: &'static str,
        /// The id that was not found.
        id: String,
    },

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(#[from] KeelsonError),
}

impl ContentError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a not found error.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Storage failures may be retried; everything else needs caller correction.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_retryable())
    }
}

impl From<ContentError> for KeelsonError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::Validation(message) => KeelsonError::Validation(message),
            ContentError::NotFound { .. } => KeelsonError::NotFound(err.to_string()),
            ContentError::Storage(inner) => inner,
        }
    }
}

/// Result type for content operations.
pub type Result<T> = std::result::Result<T, ContentError>;
