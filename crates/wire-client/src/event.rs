//! Events surfaced by the protocol stack.

use serde_json::{Map, Value};
use std::fmt;

/// Numeric status code attached to a connection close.
///
/// The stack maps its internal close causes onto these codes; unrecognized
/// values are carried verbatim so the linking core can log them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisconnectCode(pub u16);

impl DisconnectCode {
    /// Stored credentials are unusable.
    pub const BAD_SESSION: Self = Self(500);
    /// The stack closed the connection and will retry.
    pub const CONNECTION_CLOSED: Self = Self(428);
    /// The server dropped the connection; the stack will retry.
    pub const CONNECTION_LOST: Self = Self(408);
    /// Another session took over this account.
    pub const CONNECTION_REPLACED: Self = Self(440);
    /// The device was logged out remotely.
    pub const LOGGED_OUT: Self = Self(401);
    /// The stack needs a connection restart; it handles this itself.
    pub const RESTART_REQUIRED: Self = Self(515);
    /// The connection attempt timed out.
    pub const TIMED_OUT: Self = Self(504);

    /// The raw numeric value.
    pub fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for DisconnectCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A connection-state event from the protocol stack.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// A linking artifact (QR payload) is ready to present.
    QrReady {
        /// Opaque renderable blob, forwarded unmodified.
        payload: String,
    },

    /// The connection reached the open state; credentials are live.
    Opened,

    /// The connection closed with the given status code.
    Closed {
        /// Close cause as reported by the stack.
        status: DisconnectCode,
    },
}

impl ConnectionEvent {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::QrReady { .. } => "qr-ready",
            Self::Opened => "opened",
            Self::Closed { .. } => "closed",
        }
    }
}

/// A credential update to be merged into durable storage.
///
/// Updates must be persisted in the order the stack issued them.
#[derive(Debug, Clone)]
pub struct CredentialUpdate {
    /// Partial bundle; top-level keys replace stored ones.
    pub patch: Map<String, Value>,
}
