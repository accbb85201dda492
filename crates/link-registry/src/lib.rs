//! Per-identifier mutual exclusion for linking attempts.
//!
//! At most one linking attempt may run for a given account identifier at a
//! time: two concurrent attempts would write to the same credential
//! directory. The registry is an arena of active identifiers; acquiring a
//! slot for an identifier that is already active is rejected immediately
//! rather than queued, since a pairing flow can stay open for an unbounded
//! amount of time.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::debug;

/// Errors from slot acquisition.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// Another linking attempt already holds the identifier.
    #[error("a linking attempt is already active for {0}")]
    Conflict(String),
}

/// Thread-safe arena of active linking attempts, keyed by account identifier.
#[derive(Clone, Default)]
pub struct LinkRegistry {
    active: Arc<Mutex<HashSet<String>>>,
}

impl LinkRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the identifier for one linking attempt.
    ///
    /// Returns a slot that releases the identifier when dropped. A second
    /// acquire for the same identifier fails with [`RegistryError::Conflict`]
    /// until the first slot is released.
    pub fn acquire(&self, identifier: &str) -> Result<LinkSlot, RegistryError> {
        let mut active = self.active.lock().unwrap();
        if !active.insert(identifier.to_string()) {
            return Err(RegistryError::Conflict(identifier.to_string()));
        }
        debug!(identifier, "link slot acquired");
        Ok(LinkSlot {
            identifier: identifier.to_string(),
            active: self.active.clone(),
        })
    }

    /// Whether an attempt is currently active for the identifier.
    pub fn is_active(&self, identifier: &str) -> bool {
        self.active.lock().unwrap().contains(identifier)
    }

    /// Number of currently active attempts.
    pub fn active_count(&self) -> usize {
        self.active.lock().unwrap().len()
    }
}

/// Exclusive claim on one identifier; dropping it releases the claim.
#[derive(Debug)]
pub struct LinkSlot {
    identifier: String,
    active: Arc<Mutex<HashSet<String>>>,
}

impl LinkSlot {
    /// The identifier this slot holds.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl Drop for LinkSlot {
    fn drop(&mut self) {
        self.active.lock().unwrap().remove(&self.identifier);
        debug!(identifier = %self.identifier, "link slot released");
    }
}
