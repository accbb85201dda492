//! Durable credential bundle storage.
//!
//! Each account identifier owns one directory under the storage root, with
//! the credential bundle persisted as `creds.json`. The bundle itself is
//! opaque to this crate: the protocol stack produces it and mutates it
//! through partial updates, and the store's only job is to apply those
//! updates in order and hand the final bundle back after linking succeeds.

mod bundle;
mod error;
mod paths;
mod store;

pub use bundle::{CredentialBundle, CredentialPatch};
pub use error::{StorageError, StorageResult};
pub use paths::StoragePaths;
pub use store::{CredentialStore, CREDS_FILE};
