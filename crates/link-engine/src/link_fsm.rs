//! Connection state machine for one linking attempt.
//!
//! Transitions are explicit and guarded so the two load-bearing invariants
//! hold by construction: the bundle is only extracted from the `Connected`
//! state, and a close observed after extraction completes the attempt
//! instead of failing it.
//!
//! ## State Diagram
//!
//! ```text
//! ┌──────────┐ QrReady / AlreadyRegistered / PairingIssued
//! │   Init   ├────────────────────────────────┐
//! └────┬─────┘                                ▼
//!      │                              ┌──────────────┐ QrReady,
//!      │                              │   Linking    │ TransientClose
//!      │                              └──────┬───────┘ (self-loop)
//!      │                                     │ Opened
//!      │                                     ▼
//!      │                              ┌──────────────┐ TransientClose
//!      │                              │  Connected   │ (self-loop)
//!      │                              └──────┬───────┘
//!      │                                     │ ExtractOk
//!      │                                     ▼
//!      │ TerminalClose /              ┌──────────────┐
//!      │ StreamEnd / Cancel           │  Extracted   │
//!      │ (from every state)           └──────┬───────┘
//!      │                                     │ TerminalClose / StreamEnd / Cancel
//!      ▼                                     ▼
//! ┌─────────────────────────────────────────────────┐
//! │                     Closed                      │
//! └─────────────────────────────────────────────────┘
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

// Define the FSM using rust-fsm's declarative macro
// This generates a module `link_machine` with:
// - link_machine::State (enum)
// - link_machine::Input (enum)
// - link_machine::StateMachine (type alias)
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub link_machine(Init)

    Init => {
        QrReady => Linking,
        AlreadyRegistered => Linking,
        PairingIssued => Linking,
        TerminalClose => Closed,
        StreamEnd => Closed,
        Cancel => Closed
    },
    Linking => {
        // QR refresh while awaiting the scan
        QrReady => Linking,
        Opened => Connected,
        TransientClose => Linking,
        TerminalClose => Closed,
        StreamEnd => Closed,
        Cancel => Closed
    },
    Connected => {
        ExtractOk => Extracted,
        TransientClose => Connected,
        TerminalClose => Closed,
        StreamEnd => Closed,
        Cancel => Closed
    },
    Extracted => {
        // The close that follows our own logout lands here.
        TerminalClose => Closed,
        StreamEnd => Closed,
        Cancel => Closed
    }
}

// Re-export the generated types with clearer names
pub use link_machine::Input as LinkMachineInput;
pub use link_machine::State as LinkMachineState;
pub use link_machine::StateMachine as LinkMachine;

/// Observable linking state for logging and IPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// Attempt created; no connection activity seen yet.
    Init,
    /// Waiting for the device side to confirm (QR scan or pairing code).
    Linking,
    /// Connection open; waiting for credentials to be persisted.
    Connected,
    /// Credential bundle emitted to the requester.
    Extracted,
    /// Attempt over; resources released.
    Closed,
}

impl LinkState {
    /// Returns true once the attempt can no longer make progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LinkState::Closed)
    }
}

impl From<&LinkMachineState> for LinkState {
    fn from(state: &LinkMachineState) -> Self {
        match state {
            LinkMachineState::Init => LinkState::Init,
            LinkMachineState::Linking => LinkState::Linking,
            LinkMachineState::Connected => LinkState::Connected,
            LinkMachineState::Extracted => LinkState::Extracted,
            LinkMachineState::Closed => LinkState::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_init() {
        let machine = LinkMachine::new();
        assert_eq!(*machine.state(), LinkMachineState::Init);
    }

    #[test]
    fn pairing_flow_reaches_extracted() {
        let mut machine = LinkMachine::new();

        machine.consume(&LinkMachineInput::PairingIssued).unwrap();
        assert_eq!(*machine.state(), LinkMachineState::Linking);

        machine.consume(&LinkMachineInput::Opened).unwrap();
        assert_eq!(*machine.state(), LinkMachineState::Connected);

        machine.consume(&LinkMachineInput::ExtractOk).unwrap();
        assert_eq!(*machine.state(), LinkMachineState::Extracted);
    }

    #[test]
    fn qr_refresh_stays_in_linking() {
        let mut machine = LinkMachine::new();

        machine.consume(&LinkMachineInput::QrReady).unwrap();
        assert_eq!(*machine.state(), LinkMachineState::Linking);

        machine.consume(&LinkMachineInput::QrReady).unwrap();
        assert_eq!(*machine.state(), LinkMachineState::Linking);
    }

    #[test]
    fn transient_close_loops_on_linking_and_connected() {
        let mut machine = LinkMachine::new();
        machine.consume(&LinkMachineInput::QrReady).unwrap();

        machine.consume(&LinkMachineInput::TransientClose).unwrap();
        assert_eq!(*machine.state(), LinkMachineState::Linking);

        machine.consume(&LinkMachineInput::Opened).unwrap();
        machine.consume(&LinkMachineInput::TransientClose).unwrap();
        assert_eq!(*machine.state(), LinkMachineState::Connected);
    }

    #[test]
    fn cannot_open_before_linking() {
        let mut machine = LinkMachine::new();
        assert!(machine.consume(&LinkMachineInput::Opened).is_err());
        assert_eq!(*machine.state(), LinkMachineState::Init);
    }

    #[test]
    fn cannot_extract_before_open() {
        let mut machine = LinkMachine::new();
        machine.consume(&LinkMachineInput::QrReady).unwrap();
        assert!(machine.consume(&LinkMachineInput::ExtractOk).is_err());
    }

    #[test]
    fn transient_close_is_rejected_in_init() {
        let mut machine = LinkMachine::new();
        assert!(machine.consume(&LinkMachineInput::TransientClose).is_err());
    }

    #[test]
    fn terminal_close_reaches_closed_from_every_state() {
        for setup in [
            Vec::new(),
            vec![LinkMachineInput::QrReady],
            vec![LinkMachineInput::QrReady, LinkMachineInput::Opened],
            vec![
                LinkMachineInput::QrReady,
                LinkMachineInput::Opened,
                LinkMachineInput::ExtractOk,
            ],
        ] {
            let mut machine = LinkMachine::new();
            for input in &setup {
                machine.consume(input).unwrap();
            }
            machine.consume(&LinkMachineInput::TerminalClose).unwrap();
            assert_eq!(*machine.state(), LinkMachineState::Closed);
        }
    }

    #[test]
    fn cancel_reaches_closed_from_every_state() {
        for setup in [
            Vec::new(),
            vec![LinkMachineInput::AlreadyRegistered],
            vec![LinkMachineInput::AlreadyRegistered, LinkMachineInput::Opened],
        ] {
            let mut machine = LinkMachine::new();
            for input in &setup {
                machine.consume(input).unwrap();
            }
            machine.consume(&LinkMachineInput::Cancel).unwrap();
            assert_eq!(*machine.state(), LinkMachineState::Closed);
        }
    }

    #[test]
    fn closed_accepts_no_inputs() {
        let mut machine = LinkMachine::new();
        machine.consume(&LinkMachineInput::Cancel).unwrap();

        assert!(machine.consume(&LinkMachineInput::Opened).is_err());
        assert!(machine.consume(&LinkMachineInput::TerminalClose).is_err());
        assert_eq!(*machine.state(), LinkMachineState::Closed);
    }

    #[test]
    fn link_state_conversion() {
        assert_eq!(LinkState::from(&LinkMachineState::Init), LinkState::Init);
        assert_eq!(
            LinkState::from(&LinkMachineState::Linking),
            LinkState::Linking
        );
        assert_eq!(
            LinkState::from(&LinkMachineState::Connected),
            LinkState::Connected
        );
        assert_eq!(
            LinkState::from(&LinkMachineState::Extracted),
            LinkState::Extracted
        );
        assert_eq!(LinkState::from(&LinkMachineState::Closed), LinkState::Closed);
    }

    #[test]
    fn only_closed_is_terminal() {
        assert!(!LinkState::Init.is_terminal());
        assert!(!LinkState::Linking.is_terminal());
        assert!(!LinkState::Connected.is_terminal());
        assert!(!LinkState::Extracted.is_terminal());
        assert!(LinkState::Closed.is_terminal());
    }
}
