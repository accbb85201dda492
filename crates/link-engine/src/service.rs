//! Front door for linking requests.

use crate::event::{EventSink, LinkEvent};
use crate::orchestrator::{CancelHandle, LinkOrchestrator, LinkOutcome};
use crate::{LinkError, LinkResult};
use credential_store::{CredentialStore, StoragePaths};
use link_registry::LinkRegistry;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use wire_client::ClientFactory;

/// Accepts linking requests and runs one orchestrator task per request.
///
/// Holds the per-identifier registry: a second request for an identifier
/// that is still linking is rejected before any storage or connection work
/// happens.
pub struct LinkService {
    paths: StoragePaths,
    factory: Arc<dyn ClientFactory>,
    registry: LinkRegistry,
}

impl LinkService {
    /// Create a service storing credentials under the given paths.
    pub fn new(paths: StoragePaths, factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            paths,
            factory,
            registry: LinkRegistry::new(),
        }
    }

    /// The active-attempt registry.
    pub fn registry(&self) -> &LinkRegistry {
        &self.registry
    }

    /// Start a linking attempt for a normalized identifier.
    ///
    /// The identifier's format was validated upstream; only existence is
    /// checked here. Fails fast with [`LinkError::Storage`] if the
    /// credential directory cannot be created, before any connection is
    /// opened.
    pub async fn start_link(
        &self,
        identifier: &str,
        sink: Arc<dyn EventSink>,
    ) -> LinkResult<LinkHandle> {
        if identifier.trim().is_empty() {
            return Err(LinkError::Validation(
                "account identifier is empty".to_string(),
            ));
        }

        let slot = self.registry.acquire(identifier)?;

        let store = match CredentialStore::open(self.paths.root(), identifier).await {
            Ok(store) => store,
            Err(err) => {
                sink.emit(LinkEvent::Error(format!(
                    "credential storage unavailable: {err}"
                )));
                return Err(err.into());
            }
        };

        info!(identifier, "link request accepted");

        let orchestrator =
            LinkOrchestrator::new(identifier, sink, store, self.factory.clone());
        let cancel = orchestrator.cancel_handle();

        let identifier_owned = identifier.to_string();
        let task = tokio::spawn(async move {
            let result = orchestrator.run().await;
            if let Err(ref err) = result {
                warn!(identifier = %identifier_owned, %err, "link attempt ended in error");
            }
            // Release the identifier only after the attempt fully ends.
            drop(slot);
            result
        });

        Ok(LinkHandle { cancel, task })
    }
}

/// Handle to a running linking attempt.
#[derive(Debug)]
pub struct LinkHandle {
    cancel: CancelHandle,
    task: JoinHandle<LinkResult<LinkOutcome>>,
}

impl LinkHandle {
    /// Request cancellation; the attempt terminates its connection and
    /// closes promptly.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the attempt to finish.
    pub async fn join(self) -> LinkResult<LinkOutcome> {
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(LinkError::Task(err.to_string())),
        }
    }
}
