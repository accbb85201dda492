//! The protocol client contract.

use crate::{ClientConfig, ConnectionEvent, CredentialUpdate, WireResult};
use futures_util::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Handle to one live protocol connection.
///
/// The stack owns the socket, the cryptography, and reconnection: when a
/// close is transient (see the linking engine's classification) the stack
/// retries internally and the same event streams keep delivering. The
/// linking core must not attempt its own reconnects.
///
/// Both event streams can be taken exactly once, and must be taken before
/// the connection starts delivering events.
pub trait ProtocolClient: Send + Sync {
    /// Take the connection-state event stream. `None` if already taken.
    fn connection_events(&self) -> Option<mpsc::UnboundedReceiver<ConnectionEvent>>;

    /// Take the credential-update stream. `None` if already taken.
    ///
    /// Updates arrive in the order the stack issued them; the consumer is
    /// responsible for persisting them in that order.
    fn credential_updates(&self) -> Option<mpsc::UnboundedReceiver<CredentialUpdate>>;

    /// Ask the stack to issue a pairing code for the identifier.
    fn request_pairing_code(&self, identifier: &str) -> BoxFuture<'_, WireResult<String>>;

    /// Log the linked device out, releasing the server-side session.
    fn logout(&self) -> BoxFuture<'_, WireResult<()>>;

    /// Tear the connection down unconditionally. Idempotent.
    fn terminate(&self) -> BoxFuture<'_, ()>;

    /// Whether the loaded credentials already carry a registration.
    fn is_registered(&self) -> bool;
}

/// Opens protocol connections.
pub trait ClientFactory: Send + Sync {
    /// Open a connection configured with the given credentials and caches.
    fn open(&self, config: ClientConfig) -> BoxFuture<'_, WireResult<Arc<dyn ProtocolClient>>>;
}
