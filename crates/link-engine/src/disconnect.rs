//! Disconnect-reason classification.
//!
//! The protocol stack reports a numeric status code on every connection
//! close. Three of those mean the stack is about to retry on its own; the
//! orchestrator must stay out of its way. Everything else ends the attempt.

use wire_client::DisconnectCode;

/// Classified cause of a connection close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Stored credentials are unusable; the session file must be
    /// regenerated.
    BadSession,
    /// Stack-initiated close; it reconnects internally.
    ConnectionClosed,
    /// Server dropped the connection; the stack reconnects internally.
    ConnectionLost,
    /// Another session took over the account.
    ConnectionReplaced,
    /// The device was logged out remotely.
    LoggedOut,
    /// The stack restarts the connection itself.
    RestartRequired,
    /// The connection attempt timed out.
    TimedOut,
    /// A status code outside the fixed mapping.
    Unknown(u16),
}

impl DisconnectReason {
    /// Map a raw status code onto its classification.
    pub fn from_code(code: DisconnectCode) -> Self {
        match code {
            DisconnectCode::BAD_SESSION => Self::BadSession,
            DisconnectCode::CONNECTION_CLOSED => Self::ConnectionClosed,
            DisconnectCode::CONNECTION_LOST => Self::ConnectionLost,
            DisconnectCode::CONNECTION_REPLACED => Self::ConnectionReplaced,
            DisconnectCode::LOGGED_OUT => Self::LoggedOut,
            DisconnectCode::RESTART_REQUIRED => Self::RestartRequired,
            DisconnectCode::TIMED_OUT => Self::TimedOut,
            DisconnectCode(raw) => Self::Unknown(raw),
        }
    }

    /// Whether the stack recovers from this close on its own.
    ///
    /// The orchestrator force-terminates the connection exactly when this
    /// is false; terminating a transient close would tear down a connection
    /// the stack is about to retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed | Self::ConnectionLost | Self::RestartRequired
        )
    }

    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::BadSession => "bad-session",
            Self::ConnectionClosed => "connection-closed",
            Self::ConnectionLost => "connection-lost",
            Self::ConnectionReplaced => "connection-replaced",
            Self::LoggedOut => "logged-out",
            Self::RestartRequired => "restart-required",
            Self::TimedOut => "timed-out",
            Self::Unknown(_) => "unknown",
        }
    }

    /// User-facing message for terminal reasons; `None` when transient.
    pub fn terminal_message(&self) -> Option<String> {
        match self {
            Self::BadSession => Some("bad session file, regenerate.".to_string()),
            Self::ConnectionReplaced => {
                Some("another session is active for this identifier.".to_string())
            }
            Self::LoggedOut => Some("device logged out, relink required.".to_string()),
            Self::TimedOut => Some("connection timed out.".to_string()),
            Self::Unknown(raw) => Some(format!("unexpected disconnect (status {raw}).")),
            Self::ConnectionClosed | Self::ConnectionLost | Self::RestartRequired => None,
        }
    }
}
