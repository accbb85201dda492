//! Error types for the protocol client contract.

use thiserror::Error;

/// Protocol client error type.
#[derive(Error, Debug)]
pub enum WireError {
    /// The stack refused or failed to issue a pairing code.
    #[error("Pairing code unavailable: {0}")]
    PairingUnavailable(String),

    /// An operation was attempted without an open connection.
    #[error("Not connected")]
    NotConnected,

    /// Transport-level failure inside the stack.
    #[error("Transport error: {0}")]
    Transport(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using WireError.
pub type WireResult<T> = Result<T, WireError>;
