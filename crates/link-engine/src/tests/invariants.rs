//! Hard invariants: disconnect classification, at-most-once terminate,
//! per-identifier exclusion, cancellation.

use super::harness::{MockClient, MockFactory, RecordingSink, Script};
use crate::event::LinkEvent;
use crate::orchestrator::{LinkOrchestrator, LinkOutcome};
use crate::service::LinkService;
use crate::{LinkError, LinkResult};
use credential_store::{CredentialStore, StoragePaths};
use std::sync::Arc;
use tempfile::tempdir;
use wire_client::{ConnectionEvent, DisconnectCode};

const ID: &str = "4917012345678";

/// Run an attempt that receives a single close with the given status.
async fn run_with_close(
    status: DisconnectCode,
    transient: bool,
) -> (Arc<MockClient>, Arc<RecordingSink>, LinkResult<LinkOutcome>) {
    let root = tempdir().unwrap();
    let store = CredentialStore::open(root.path(), ID).await.unwrap();
    let script = Script::registered();
    let client = script.client.clone();
    let factory = MockFactory::new();
    factory.push(client.clone());
    let sink = RecordingSink::new();

    let orchestrator = LinkOrchestrator::new(ID, sink.clone(), store, factory.clone());
    let task = tokio::spawn(orchestrator.run());

    script.send(ConnectionEvent::Closed { status });
    if transient {
        // A transient close does not end the attempt; the attempt only ends
        // here because the stack goes away.
        script.end_streams();
    }

    let result = task.await.unwrap();
    (client, sink, result)
}

async fn assert_terminal(status: DisconnectCode, expected_message: &str) {
    let (client, sink, result) = run_with_close(status, false).await;

    match result {
        Err(LinkError::Disconnected(message)) => assert_eq!(message, expected_message),
        other => panic!("expected Disconnected error, got {other:?}"),
    }
    assert_eq!(sink.count("error"), 1, "exactly one error event");
    assert_eq!(sink.count("complete"), 1, "exactly one complete event");
    assert_eq!(client.terminate_calls(), 1, "exactly one terminate call");

    // The error precedes the completion notice.
    let names = sink.names();
    let error_pos = names.iter().position(|n| *n == "error").unwrap();
    let complete_pos = names.iter().position(|n| *n == "complete").unwrap();
    assert!(error_pos < complete_pos);
}

async fn assert_transient(status: DisconnectCode) {
    let (client, sink, result) = run_with_close(status, true).await;

    assert_eq!(result.unwrap(), LinkOutcome::Dropped);
    assert_eq!(sink.count("error"), 0, "no error events");
    assert_eq!(sink.count("complete"), 0, "no complete events");
    assert_eq!(client.terminate_calls(), 0, "no terminate calls");
}

#[tokio::test]
async fn bad_session_is_terminal() {
    assert_terminal(DisconnectCode::BAD_SESSION, "bad session file, regenerate.").await;
}

#[tokio::test]
async fn connection_replaced_is_terminal() {
    assert_terminal(
        DisconnectCode::CONNECTION_REPLACED,
        "another session is active for this identifier.",
    )
    .await;
}

#[tokio::test]
async fn logged_out_is_terminal() {
    assert_terminal(
        DisconnectCode::LOGGED_OUT,
        "device logged out, relink required.",
    )
    .await;
}

#[tokio::test]
async fn timed_out_is_terminal() {
    assert_terminal(DisconnectCode::TIMED_OUT, "connection timed out.").await;
}

#[tokio::test]
async fn unknown_code_is_terminal_and_reported_raw() {
    assert_terminal(DisconnectCode(777), "unexpected disconnect (status 777).").await;
}

#[tokio::test]
async fn connection_closed_is_transient() {
    assert_transient(DisconnectCode::CONNECTION_CLOSED).await;
}

#[tokio::test]
async fn connection_lost_is_transient() {
    assert_transient(DisconnectCode::CONNECTION_LOST).await;
}

#[tokio::test]
async fn restart_required_is_transient() {
    assert_transient(DisconnectCode::RESTART_REQUIRED).await;
}

#[tokio::test]
async fn cancel_terminates_and_completes() {
    let root = tempdir().unwrap();
    let store = CredentialStore::open(root.path(), ID).await.unwrap();
    let script = Script::registered();
    let client = script.client.clone();
    let factory = MockFactory::new();
    factory.push(client.clone());
    let sink = RecordingSink::new();

    let orchestrator = LinkOrchestrator::new(ID, sink.clone(), store, factory.clone());
    let cancel = orchestrator.cancel_handle();
    let task = tokio::spawn(orchestrator.run());

    sink.wait_for_status("connecting").await;
    cancel.cancel();

    let outcome = task.await.unwrap().unwrap();
    assert_eq!(outcome, LinkOutcome::Cancelled);
    assert_eq!(client.terminate_calls(), 1);
    assert_eq!(
        sink.events().last().unwrap(),
        &LinkEvent::Complete("link attempt cancelled".to_string())
    );
}

#[tokio::test]
async fn racing_cancel_and_terminal_close_terminate_once() {
    let root = tempdir().unwrap();
    let store = CredentialStore::open(root.path(), ID).await.unwrap();
    let script = Script::registered();
    let client = script.client.clone();
    let factory = MockFactory::new();
    factory.push(client.clone());
    let sink = RecordingSink::new();

    let orchestrator = LinkOrchestrator::new(ID, sink.clone(), store, factory.clone());
    let cancel = orchestrator.cancel_handle();
    let task = tokio::spawn(orchestrator.run());

    // Whichever arm wins, the connection is released exactly once.
    script.send(ConnectionEvent::Closed {
        status: DisconnectCode::LOGGED_OUT,
    });
    cancel.cancel();

    let _ = task.await.unwrap();
    assert_eq!(client.terminate_calls(), 1);
    assert_eq!(sink.count("complete"), 1);
}

#[tokio::test]
async fn service_rejects_concurrent_attempts_for_one_identifier() {
    let root = tempdir().unwrap();
    let factory = MockFactory::new();
    let first = Script::registered();
    factory.push(first.client.clone());

    let service = LinkService::new(
        StoragePaths::with_root(root.path().to_path_buf()),
        factory.clone(),
    );

    let sink = RecordingSink::new();
    let handle = service.start_link(ID, sink.clone()).await.unwrap();

    let second_sink = RecordingSink::new();
    let err = service.start_link(ID, second_sink).await.unwrap_err();
    assert!(matches!(err, LinkError::Conflict(identifier) if identifier == ID));

    // Releasing the first attempt frees the identifier for a new one.
    handle.cancel();
    handle.join().await.unwrap();
    assert!(!service.registry().is_active(ID));

    let third = Script::registered();
    factory.push(third.client.clone());
    let retry_sink = RecordingSink::new();
    let retry = service.start_link(ID, retry_sink).await.unwrap();
    retry.cancel();
    retry.join().await.unwrap();
}

#[tokio::test]
async fn service_allows_distinct_identifiers_concurrently() {
    let root = tempdir().unwrap();
    let factory = MockFactory::new();
    // Keep the scripts alive so both attempts stay blocked on their event
    // streams while the registry is inspected.
    let first = Script::registered();
    let second = Script::registered();
    factory.push(first.client.clone());
    factory.push(second.client.clone());

    let service = LinkService::new(
        StoragePaths::with_root(root.path().to_path_buf()),
        factory.clone(),
    );

    let a = service
        .start_link("4917012345678", RecordingSink::new())
        .await
        .unwrap();
    let b = service
        .start_link("2348012345678", RecordingSink::new())
        .await
        .unwrap();
    assert_eq!(service.registry().active_count(), 2);

    a.cancel();
    b.cancel();
    a.join().await.unwrap();
    b.join().await.unwrap();
}

#[tokio::test]
async fn service_rejects_empty_identifier() {
    let root = tempdir().unwrap();
    let service = LinkService::new(
        StoragePaths::with_root(root.path().to_path_buf()),
        MockFactory::new(),
    );

    let err = service
        .start_link("", RecordingSink::new())
        .await
        .unwrap_err();
    assert!(matches!(err, LinkError::Validation(_)));

    let err = service
        .start_link("   ", RecordingSink::new())
        .await
        .unwrap_err();
    assert!(matches!(err, LinkError::Validation(_)));
}

#[tokio::test]
async fn service_fails_fast_when_storage_is_unavailable() {
    let root = tempdir().unwrap();
    // A file where the storage root should be makes directory creation fail.
    let blocked_root = root.path().join("blocked");
    std::fs::write(&blocked_root, b"not a directory").unwrap();

    let factory = MockFactory::new();
    let service = LinkService::new(StoragePaths::with_root(blocked_root), factory.clone());

    let sink = RecordingSink::new();
    let err = service.start_link(ID, sink.clone()).await.unwrap_err();

    assert!(matches!(err, LinkError::Storage(_)));
    assert_eq!(sink.count("error"), 1);
    // No connection was ever opened.
    assert!(factory.captured_configs().is_empty());
    // The failed attempt does not leak its registry slot.
    assert!(!service.registry().is_active(ID));
}
