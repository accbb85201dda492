//! Linking error types.

use link_registry::RegistryError;
use thiserror::Error;

/// Linking error type.
#[derive(Error, Debug)]
pub enum LinkError {
    /// The request is malformed (empty identifier).
    #[error("Invalid link request: {0}")]
    Validation(String),

    /// Another linking attempt is already active for the identifier.
    #[error("A linking attempt is already active for {0}")]
    Conflict(String),

    /// Credential storage failed; the attempt ends before or during the
    /// connection.
    #[error("Storage error: {0}")]
    Storage(#[from] credential_store::StorageError),

    /// The protocol stack failed to open or operate the connection.
    #[error("Wire error: {0}")]
    Wire(#[from] wire_client::WireError),

    /// The stack refused to issue a pairing code.
    #[error("Pairing request failed: {0}")]
    PairingRequest(String),

    /// The credential bundle was unreadable after the connection opened.
    #[error("Credential extraction failed: {0}")]
    Extraction(String),

    /// The connection closed with a terminal reason.
    #[error("Connection failed: {0}")]
    Disconnected(String),

    /// Invalid transition in the link state machine.
    #[error("Invalid link state transition: {0}")]
    InvalidStateTransition(String),

    /// A client event stream was not available to subscribe to.
    #[error("Client {0} event stream unavailable")]
    EventsUnavailable(&'static str),

    /// The spawned link task died.
    #[error("Link task failed: {0}")]
    Task(String),
}

impl From<RegistryError> for LinkError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Conflict(identifier) => LinkError::Conflict(identifier),
        }
    }
}

/// Result type alias using LinkError.
pub type LinkResult<T> = Result<T, LinkError>;
