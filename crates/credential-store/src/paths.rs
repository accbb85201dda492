//! File system layout for credential storage.

use crate::{StorageError, StorageResult};
use std::path::PathBuf;

/// Directory name under the home directory for runtime state.
const BASE_DIR_NAME: &str = ".relink";
/// Subdirectory holding one credential directory per identifier.
const SESSIONS_DIR_NAME: &str = "sessions";

/// Manages file system paths for credential storage.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    /// Root directory holding per-identifier session directories.
    root: PathBuf,
}

impl StoragePaths {
    /// Create paths rooted at `~/.relink/sessions`.
    pub fn new() -> StorageResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| StorageError::Root("Could not determine home directory".to_string()))?;

        Ok(Self {
            root: home.join(BASE_DIR_NAME).join(SESSIONS_DIR_NAME),
        })
    }

    /// Create paths with a custom root directory.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    /// The storage root.
    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Credential directory for one identifier.
    pub fn session_dir(&self, identifier: &str) -> PathBuf {
        self.root.join(identifier)
    }
}
