//! Shared helpers for the integration tests.

use std::path::Path;
use std::sync::Arc;

use credstore_secrets::{CredentialStore, Result, StdFileSystem, StoreLocation};
use rand::rngs::OsRng;

/// Open the store in `dir` with default file names.
pub fn open_store(dir: &Path) -> Result<CredentialStore> {
    CredentialStore::open(
        StoreLocation::in_dir(dir),
        Arc::new(StdFileSystem),
        Box::new(OsRng),
    )
}
