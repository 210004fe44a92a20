//! Store error types.

use thiserror::Error;

/// Errors raised by a [`SecretStore`](super::SecretStore) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Referenced record does not exist
    #[error("not found: {what}")]
    NotFound {
        /// Description of the missing record
        what: String,
    },

    /// Write contradicts existing state
    #[error("conflict: {reason}")]
    Conflict {
        /// What conflicted
        reason: String,
    },

    /// Persisted data could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Underlying storage system failed
    #[error("I/O error: {0}")]
    Io(String),
}

impl StoreError {
    /// Whether the same operation may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
