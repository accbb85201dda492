//! The linking orchestrator.
//!
//! One instance owns one linking attempt: one protocol connection, one
//! credential store handle, one event sink. The attempt runs as a single
//! task consuming the connection-state stream, with a side task persisting
//! credential updates in arrival order. All state transitions go through
//! the guarded machine in [`crate::link_fsm`], and the connection is
//! force-terminated at most once, only for non-transient ends.

use crate::disconnect::DisconnectReason;
use crate::event::{EventSink, LinkEvent};
use crate::link_fsm::{LinkMachine, LinkMachineInput, LinkState};
use crate::pairing::format_pairing_code;
use crate::{LinkError, LinkResult};
use credential_store::CredentialStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch, Notify};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use wire_client::{
    ClientConfig, ClientFactory, ConnectionEvent, CredentialUpdate, ProtocolClient, RetryCache,
    WireLogLevel,
};

/// How a finished attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The credential bundle was extracted and emitted.
    Linked,
    /// The attempt was cancelled from outside.
    Cancelled,
    /// The event stream ended before the attempt reached an outcome.
    Dropped,
}

#[derive(Debug)]
struct CancelInner {
    flag: AtomicBool,
    notify: Notify,
    /// Set by the persistence bridge when a save fails, so the cancel path
    /// can report the attempt as failed rather than user-cancelled.
    abort_error: Mutex<Option<LinkError>>,
}

/// Cancels a running attempt from outside the orchestrator task.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    inner: Arc<CancelInner>,
}

impl CancelHandle {
    fn new() -> Self {
        Self {
            inner: Arc::new(CancelInner {
                flag: AtomicBool::new(false),
                notify: Notify::new(),
                abort_error: Mutex::new(None),
            }),
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    fn abort(&self, err: LinkError) {
        *self.inner.abort_error.lock().unwrap() = Some(err);
        self.cancel();
    }

    fn take_abort_error(&self) -> Option<LinkError> {
        self.inner.abort_error.lock().unwrap().take()
    }

    async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// What the open-connection handler decided.
enum AfterOpen {
    /// Bundle emitted; keep consuming events until the stack closes.
    Extracted,
    /// The attempt finished while waiting for the first credential write.
    Finished(LinkOutcome),
}

/// Drives one linking attempt end to end.
pub struct LinkOrchestrator {
    identifier: String,
    attempt_id: Uuid,
    sink: Arc<dyn EventSink>,
    store: CredentialStore,
    factory: Arc<dyn ClientFactory>,
    machine: Mutex<LinkMachine>,
    cancel: CancelHandle,
    terminated: AtomicBool,
}

impl LinkOrchestrator {
    /// Create an orchestrator for a normalized identifier.
    ///
    /// The store handle must already be open (its directory exists); format
    /// validation of the identifier happened upstream.
    pub fn new(
        identifier: impl Into<String>,
        sink: Arc<dyn EventSink>,
        store: CredentialStore,
        factory: Arc<dyn ClientFactory>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            attempt_id: Uuid::new_v4(),
            sink,
            store,
            factory,
            machine: Mutex::new(LinkMachine::new()),
            cancel: CancelHandle::new(),
            terminated: AtomicBool::new(false),
        }
    }

    /// Handle for cancelling this attempt; grab it before `run`.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// The identifier this attempt links.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Current observable state.
    pub fn state(&self) -> LinkState {
        LinkState::from(self.machine.lock().unwrap().state())
    }

    /// Run the attempt to completion.
    pub async fn run(self) -> LinkResult<LinkOutcome> {
        info!(
            identifier = %self.identifier,
            attempt = %self.attempt_id,
            "starting link attempt"
        );

        let credentials = match self.store.load().await {
            Ok(bundle) => bundle,
            Err(err) => {
                self.sink.emit(LinkEvent::Error(format!(
                    "credential storage unavailable: {err}"
                )));
                return Err(err.into());
            }
        };

        let retry_cache = RetryCache::new();
        let config = ClientConfig::new(credentials)
            .with_retry_cache(retry_cache.clone())
            .with_log_level(WireLogLevel::Silent)
            .with_print_pairing_ui(false);

        let client = match self.factory.open(config).await {
            Ok(client) => client,
            Err(err) => {
                self.sink
                    .emit(LinkEvent::Error(format!("could not open connection: {err}")));
                return Err(err.into());
            }
        };

        // Both subscriptions must exist before the connection starts
        // delivering, or early events would be lost.
        let streams = client
            .connection_events()
            .ok_or(LinkError::EventsUnavailable("connection"))
            .and_then(|conn| {
                client
                    .credential_updates()
                    .ok_or(LinkError::EventsUnavailable("credential"))
                    .map(|cred| (conn, cred))
            });
        let (mut conn_rx, cred_rx) = match streams {
            Ok(streams) => streams,
            Err(err) => {
                self.sink.emit(LinkEvent::Error(format!(
                    "could not subscribe to connection events: {err}"
                )));
                self.terminate_once(client.as_ref()).await;
                return Err(err);
            }
        };

        let (saved_tx, mut saved_rx) = watch::channel(0u64);
        let bridge = tokio::spawn(persist_updates(
            self.store.clone(),
            cred_rx,
            saved_tx,
            self.sink.clone(),
            self.cancel.clone(),
        ));

        self.sink.emit(LinkEvent::Status("connecting".to_string()));

        if client.is_registered() {
            self.transition(LinkMachineInput::AlreadyRegistered)?;
            self.sink
                .emit(LinkEvent::Status("existing session found".to_string()));
        } else {
            match client.request_pairing_code(&self.identifier).await {
                Ok(code) => {
                    self.transition(LinkMachineInput::PairingIssued)?;
                    self.sink
                        .emit(LinkEvent::PairingCode(format_pairing_code(&code)));
                    self.sink.emit(LinkEvent::Status(
                        "awaiting device confirmation".to_string(),
                    ));
                }
                Err(err) => {
                    error!(
                        identifier = %self.identifier,
                        %err,
                        "pairing code request failed"
                    );
                    self.sink.emit(LinkEvent::Error(
                        "failed to request pairing code; check the number and that no other \
                         device is currently linking"
                            .to_string(),
                    ));
                    self.try_transition(LinkMachineInput::TerminalClose);
                    self.terminate_once(client.as_ref()).await;
                    bridge.abort();
                    return Err(LinkError::PairingRequest(err.to_string()));
                }
            }
        }

        let result = self
            .event_loop(client.as_ref(), &mut conn_rx, &mut saved_rx)
            .await;

        // The bridge ends with the update stream; on early exits it must
        // not outlive the attempt that owns the store handle.
        bridge.abort();
        retry_cache.clear();

        match &result {
            Ok(outcome) => info!(
                identifier = %self.identifier,
                attempt = %self.attempt_id,
                ?outcome,
                "link attempt finished"
            ),
            Err(err) => warn!(
                identifier = %self.identifier,
                attempt = %self.attempt_id,
                %err,
                "link attempt failed"
            ),
        }
        result
    }

    async fn event_loop(
        &self,
        client: &dyn ProtocolClient,
        conn_rx: &mut mpsc::UnboundedReceiver<ConnectionEvent>,
        saved_rx: &mut watch::Receiver<u64>,
    ) -> LinkResult<LinkOutcome> {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return self.finish_cancelled(client).await;
                }
                event = conn_rx.recv() => match event {
                    Some(ConnectionEvent::QrReady { payload }) => {
                        if self.try_transition(LinkMachineInput::QrReady) {
                            self.sink.emit(LinkEvent::Qr(payload));
                        }
                    }
                    Some(ConnectionEvent::Opened) => {
                        if !self.try_transition(LinkMachineInput::Opened) {
                            continue;
                        }
                        self.sink.emit(LinkEvent::Status("CONNECTED".to_string()));
                        match self.extract_after_first_save(client, conn_rx, saved_rx).await? {
                            AfterOpen::Extracted => {}
                            AfterOpen::Finished(outcome) => return Ok(outcome),
                        }
                    }
                    Some(ConnectionEvent::Closed { status }) => {
                        if let Some(outcome) = self.handle_close(client, status).await? {
                            return Ok(outcome);
                        }
                    }
                    None => return Ok(self.finish_stream_end()),
                }
            }
        }
    }

    /// Wait until the bridge has applied at least one credential write,
    /// then extract the persisted bundle. Extracting earlier could emit a
    /// stale or absent bundle.
    async fn extract_after_first_save(
        &self,
        client: &dyn ProtocolClient,
        conn_rx: &mut mpsc::UnboundedReceiver<ConnectionEvent>,
        saved_rx: &mut watch::Receiver<u64>,
    ) -> LinkResult<AfterOpen> {
        let mut conn_open = true;
        let mut watch_alive = true;
        loop {
            // Updates already queued behind a dead connection stream still
            // get persisted by the bridge; only give up once both sources
            // are gone.
            if !conn_open && !watch_alive {
                return Ok(AfterOpen::Finished(self.finish_stream_end()));
            }
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return self.finish_cancelled(client).await.map(AfterOpen::Finished);
                }
                changed = async { saved_rx.wait_for(|count| *count > 0).await.map(|_| ()) }, if watch_alive => {
                    match changed {
                        Ok(_) => break,
                        // Bridge gone. A save failure arrives as an abort
                        // through the cancel arm; a clean end of the update
                        // stream just disarms this branch.
                        Err(_) => watch_alive = false,
                    }
                }
                event = conn_rx.recv(), if conn_open => match event {
                    Some(ConnectionEvent::Closed { status }) => {
                        let reason = DisconnectReason::from_code(status);
                        if reason.is_transient() {
                            warn!(
                                identifier = %self.identifier,
                                reason = reason.label(),
                                "transient disconnect while awaiting credential write; \
                                 stack retries internally"
                            );
                            self.try_transition(LinkMachineInput::TransientClose);
                        } else {
                            return Err(self.fail_terminal(client, reason).await);
                        }
                    }
                    Some(other) => {
                        debug!(
                            identifier = %self.identifier,
                            event = other.name(),
                            "ignoring event while awaiting credential write"
                        );
                    }
                    None => conn_open = false,
                }
            }
        }

        match self.store.read_final().await {
            Ok(bundle) => {
                self.transition(LinkMachineInput::ExtractOk)?;
                self.sink.emit(LinkEvent::SessionId(bundle));
                // The attempt is not meant to stay online; release the
                // server-side session now that the bundle is out.
                if let Err(err) = client.logout().await {
                    warn!(
                        identifier = %self.identifier,
                        %err,
                        "logout after extraction failed"
                    );
                }
                self.sink.emit(LinkEvent::Status(
                    "DISCONNECTED_AFTER_SESSION_ID".to_string(),
                ));
                Ok(AfterOpen::Extracted)
            }
            Err(err) => {
                error!(
                    identifier = %self.identifier,
                    %err,
                    "credential bundle unreadable after connect"
                );
                self.sink.emit(LinkEvent::Error(
                    "failed to read session credentials after connection; try again".to_string(),
                ));
                self.try_transition(LinkMachineInput::TerminalClose);
                self.terminate_once(client).await;
                Err(LinkError::Extraction(err.to_string()))
            }
        }
    }

    /// Classify a close. Returns `None` to keep consuming events.
    async fn handle_close(
        &self,
        client: &dyn ProtocolClient,
        status: wire_client::DisconnectCode,
    ) -> LinkResult<Option<LinkOutcome>> {
        let reason = DisconnectReason::from_code(status);

        if reason.is_transient() {
            warn!(
                identifier = %self.identifier,
                reason = reason.label(),
                "transient disconnect; stack retries internally"
            );
            self.try_transition(LinkMachineInput::TransientClose);
            return Ok(None);
        }

        if self.state() == LinkState::Extracted {
            // The close that follows our own logout; the attempt already
            // succeeded.
            debug!(
                identifier = %self.identifier,
                reason = reason.label(),
                "connection closed after extraction"
            );
            self.try_transition(LinkMachineInput::TerminalClose);
            return Ok(Some(LinkOutcome::Linked));
        }

        Err(self.fail_terminal(client, reason).await)
    }

    /// Terminal close: surface the cause, release the connection once,
    /// report completion. Returns the error for the caller to propagate.
    async fn fail_terminal(
        &self,
        client: &dyn ProtocolClient,
        reason: DisconnectReason,
    ) -> LinkError {
        let message = reason
            .terminal_message()
            .unwrap_or_else(|| "connection closed.".to_string());

        if let DisconnectReason::Unknown(raw) = reason {
            error!(
                identifier = %self.identifier,
                raw_code = raw,
                "unrecognized disconnect status"
            );
        } else {
            error!(
                identifier = %self.identifier,
                reason = reason.label(),
                "terminal disconnect"
            );
        }

        self.sink.emit(LinkEvent::Error(message.clone()));
        self.try_transition(LinkMachineInput::TerminalClose);
        self.terminate_once(client).await;
        self.sink.emit(LinkEvent::Complete(
            "link attempt finished with error".to_string(),
        ));
        LinkError::Disconnected(message)
    }

    async fn finish_cancelled(&self, client: &dyn ProtocolClient) -> LinkResult<LinkOutcome> {
        let aborted = self.cancel.take_abort_error();
        self.try_transition(LinkMachineInput::Cancel);
        self.terminate_once(client).await;

        match aborted {
            Some(err) => {
                self.sink.emit(LinkEvent::Complete(
                    "link attempt finished with error".to_string(),
                ));
                Err(err)
            }
            None => {
                info!(identifier = %self.identifier, "link attempt cancelled");
                self.sink
                    .emit(LinkEvent::Complete("link attempt cancelled".to_string()));
                Ok(LinkOutcome::Cancelled)
            }
        }
    }

    /// The stack dropped its event stream without a terminal close.
    fn finish_stream_end(&self) -> LinkOutcome {
        let extracted = self.state() == LinkState::Extracted;
        self.try_transition(LinkMachineInput::StreamEnd);

        if extracted {
            LinkOutcome::Linked
        } else {
            warn!(
                identifier = %self.identifier,
                "event stream ended without a terminal outcome"
            );
            LinkOutcome::Dropped
        }
    }

    /// Tear the connection down, at most once per attempt.
    async fn terminate_once(&self, client: &dyn ProtocolClient) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            debug!(identifier = %self.identifier, "terminate already issued");
            return;
        }
        client.terminate().await;
        debug!(identifier = %self.identifier, "connection terminated");
    }

    fn transition(&self, input: LinkMachineInput) -> LinkResult<LinkState> {
        let mut machine = self.machine.lock().unwrap();
        let old_state = LinkState::from(machine.state());

        machine.consume(&input).map_err(|_| {
            LinkError::InvalidStateTransition(format!(
                "cannot apply {:?} in state {:?}",
                input,
                machine.state()
            ))
        })?;

        let new_state = LinkState::from(machine.state());
        drop(machine);

        if old_state != new_state {
            debug!(
                identifier = %self.identifier,
                ?old_state,
                ?new_state,
                "link state transition"
            );
        }
        Ok(new_state)
    }

    /// Guarded transition: events that are invalid for the current state
    /// are ignored, not fatal.
    fn try_transition(&self, input: LinkMachineInput) -> bool {
        match self.transition(input) {
            Ok(_) => true,
            Err(err) => {
                debug!(identifier = %self.identifier, %err, "event ignored for current state");
                false
            }
        }
    }
}

/// Persistence bridge: apply every credential update in arrival order and
/// publish the running save count for the extraction barrier.
async fn persist_updates(
    store: CredentialStore,
    mut updates: mpsc::UnboundedReceiver<CredentialUpdate>,
    saved: watch::Sender<u64>,
    sink: Arc<dyn EventSink>,
    cancel: CancelHandle,
) {
    let mut count: u64 = 0;
    while let Some(update) = updates.recv().await {
        match store.save(update.patch).await {
            Ok(()) => {
                count += 1;
                let _ = saved.send(count);
            }
            Err(err) => {
                error!(
                    identifier = store.identifier(),
                    %err,
                    "failed to persist credential update"
                );
                sink.emit(LinkEvent::Error(format!(
                    "failed to persist credentials: {err}"
                )));
                cancel.abort(LinkError::Storage(err));
                return;
            }
        }
    }
    debug!(
        identifier = store.identifier(),
        saves = count,
        "credential update stream ended"
    );
}
