//! Error types for Keel persisters.

use thiserror::Error;

use crate::credential::CredentialError;

/// Result type alias for persister operations.
pub type PersisterResult<T> = Result<T, PersisterError>;

/// Errors that can occur while reading or writing the coordination store.
#[derive(Debug, Error)]
pub enum PersisterError {
    /// The path does not exist. Callers use this to answer "is it there yet".
    #[error("not found: {0}")]
    NotFound(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Transient connectivity failure; eligible for retry.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("storage failed: {0}")]
    Storage(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid connection string: {0}")]
    InvalidConnection(String),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),
}

impl PersisterError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PersisterError::NotFound(_))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, PersisterError::Unavailable(_))
    }
}
