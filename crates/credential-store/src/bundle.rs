//! The credential bundle and partial updates to it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A partial credential update issued by the protocol stack.
///
/// Top-level keys replace their counterparts in the stored bundle.
pub type CredentialPatch = Map<String, Value>;

/// Opaque authentication material for one account.
///
/// The protocol stack produces and consumes this; the rest of the system
/// treats it as a JSON object and never inspects individual keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialBundle(Map<String, Value>);

impl CredentialBundle {
    /// Create an empty bundle (fresh, unregistered account).
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a partial update. Later writes win per top-level key.
    pub fn merge(&mut self, patch: CredentialPatch) {
        for (key, value) in patch {
            self.0.insert(key, value);
        }
    }

    /// Whether any credential material is present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Look up a top-level entry.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The underlying JSON map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for CredentialBundle {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
