//! Integration tests for the linking orchestrator.
//!
//! - `harness.rs`    - Scripted mock protocol client, factory, recording sink
//! - `linking.rs`    - End-to-end linking flows (pairing, QR, extraction)
//! - `invariants.rs` - Disconnect classification, terminate-once, registry,
//!                     cancellation

mod invariants;
