//! Session linking orchestrator.
//!
//! This crate owns one account's linking attempt end to end: it drives the
//! protocol client through QR or pairing-code linking, classifies disconnect
//! causes into retry-vs-terminal outcomes, keeps credential updates flowing
//! into durable storage in order, extracts the final credential bundle after
//! the connection opens, and guarantees the connection is released exactly
//! once on every terminal path.
//!
//! Progress is reported through the [`EventSink`] seam; whatever transport
//! sits on the other side (web socket, CLI, test harness) only sees the
//! `status` / `qr` / `pairing-code` / `session-id` / `error` / `complete`
//! event stream.

mod disconnect;
mod error;
mod event;
mod link_fsm;
mod orchestrator;
mod pairing;
mod service;

#[cfg(test)]
mod tests;

pub use disconnect::DisconnectReason;
pub use error::{LinkError, LinkResult};
pub use event::{EventSink, LinkEvent};
pub use link_fsm::link_machine;
pub use link_fsm::{LinkMachine, LinkMachineInput, LinkMachineState, LinkState};
pub use orchestrator::{CancelHandle, LinkOrchestrator, LinkOutcome};
pub use pairing::format_pairing_code;
pub use service::{LinkHandle, LinkService};
