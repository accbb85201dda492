//! Lifecycle events emitted to the requester.

use credential_store::CredentialBundle;
use serde_json::{json, Value};

/// An event emitted by the orchestrator over the event sink.
///
/// Wire names and payload shapes match what the linking front-ends expect;
/// `payload()` renders the transport form.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// Human-readable progress line.
    Status(String),

    /// A QR payload to render, forwarded from the stack unmodified.
    Qr(String),

    /// A pairing code, grouped for readability.
    PairingCode(String),

    /// The final credential bundle, read back from storage.
    SessionId(CredentialBundle),

    /// A terminal failure of the current attempt.
    Error(String),

    /// The attempt is over and resources are released.
    Complete(String),
}

impl LinkEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Status(_) => "status",
            Self::Qr(_) => "qr",
            Self::PairingCode(_) => "pairing-code",
            Self::SessionId(_) => "session-id",
            Self::Error(_) => "error",
            Self::Complete(_) => "complete",
        }
    }

    /// Transport payload for the event.
    pub fn payload(&self) -> Value {
        match self {
            Self::Status(message) => json!(message),
            Self::Qr(payload) => json!({ "qr": payload }),
            Self::PairingCode(code) => json!({ "code": code }),
            Self::SessionId(bundle) => json!({ "sessionId": bundle }),
            Self::Error(message) => json!(message),
            Self::Complete(message) => json!(message),
        }
    }

    /// Whether this event ends the attempt from the requester's view.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error(_) | Self::Complete(_))
    }
}

/// One-way channel from the orchestrator to whatever transport is listening.
///
/// `emit` is fire-and-forget; a sink must deliver events to its recipient in
/// submission order.
pub trait EventSink: Send + Sync {
    /// Deliver one event.
    fn emit(&self, event: LinkEvent);
}
