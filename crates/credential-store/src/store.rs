//! Per-identifier credential store.

use crate::{CredentialBundle, CredentialPatch, StorageError, StorageResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the persisted bundle inside a session directory.
pub const CREDS_FILE: &str = "creds.json";

/// Durable storage handle for one account's credential bundle.
///
/// The handle is cheap to clone; clones operate on the same directory.
/// The store does not lock the bundle file: callers must serialize `save`
/// calls per identifier themselves, the way the persistence bridge applies
/// updates strictly in arrival order.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    identifier: String,
    dir: PathBuf,
}

impl CredentialStore {
    /// Open (and if needed create) the credential directory for an
    /// identifier.
    ///
    /// Directory creation is idempotent. A failure here (permissions, disk)
    /// must abort the linking attempt before any connection is opened.
    pub async fn open(root: &Path, identifier: &str) -> StorageResult<Self> {
        let dir = root.join(identifier);
        tokio::fs::create_dir_all(&dir).await?;
        debug!(identifier, dir = %dir.display(), "credential store opened");

        Ok(Self {
            identifier: identifier.to_string(),
            dir,
        })
    }

    /// The identifier this store belongs to.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Path of the persisted bundle file.
    pub fn creds_file(&self) -> PathBuf {
        self.dir.join(CREDS_FILE)
    }

    /// Load the stored bundle, or a fresh empty one if nothing has been
    /// persisted yet. No file is created for the empty case.
    pub async fn load(&self) -> StorageResult<CredentialBundle> {
        match tokio::fs::read(self.creds_file()).await {
            Ok(raw) => Ok(serde_json::from_slice(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(CredentialBundle::new()),
            Err(err) => Err(err.into()),
        }
    }

    /// Apply one partial update and persist the result.
    ///
    /// The write is atomic: the merged bundle goes to a temp file in the
    /// same directory, then replaces `creds.json` via rename.
    pub async fn save(&self, patch: CredentialPatch) -> StorageResult<()> {
        let mut bundle = self.load().await?;
        bundle.merge(patch);

        let tmp = self.dir.join(format!("{CREDS_FILE}.tmp"));
        let raw = serde_json::to_vec(&bundle)?;
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, self.creds_file()).await?;

        debug!(identifier = %self.identifier, "credential bundle saved");
        Ok(())
    }

    /// Re-read the persisted bundle from disk.
    ///
    /// This is the extraction read: it must observe what `save` wrote, never
    /// an in-memory copy. Fails with [`StorageError::NotFound`] if no save
    /// has ever happened.
    pub async fn read_final(&self) -> StorageResult<CredentialBundle> {
        match tokio::fs::read(self.creds_file()).await {
            Ok(raw) => Ok(serde_json::from_slice(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(self.identifier.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }
}
