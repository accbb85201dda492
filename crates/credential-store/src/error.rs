//! Storage error types.

use thiserror::Error;

/// Credential storage error type.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The storage root could not be determined.
    #[error("Could not determine storage root: {0}")]
    Root(String),

    /// No credential bundle has been persisted for the identifier.
    #[error("No credential bundle found for {0}")]
    NotFound(String),

    /// The persisted bundle is not valid JSON.
    #[error("Credential bundle is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using StorageError.
pub type StorageResult<T> = Result<T, StorageError>;
