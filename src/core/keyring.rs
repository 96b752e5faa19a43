//! Keyring credential store collaborator.
//!
//! The provider's original tooling stores the account password in the
//! OS keychain when `--store-in-keyring` is passed. No OS keychain crate
//! is part of this crate's dependency stack, so [`KeyringStore`] is a
//! trait seam with a local-file-backed default — the same role
//! [`crate::libs::secret::Secret`] plays for the plain password cache,
//! just keyed per-username so multiple accounts don't collide.

use crate::libs::data_storage::DataStorage;
use anyhow::Result;
use std::fs;

/// Collaborator interface for persisting a password keyed by username.
pub trait KeyringStore: Send + Sync {
    fn get(&self, username: &str) -> Result<Option<String>>;
    fn set(&self, username: &str, password: &str) -> Result<()>;
    fn delete(&self, username: &str) -> Result<()>;
}

/// Default store: one encrypted file per username under the application
/// data directory, reusing [`crate::libs::secret::Secret`]'s AES-256-CBC
/// helper rather than inventing a second encryption scheme.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileKeyringStore;

impl FileKeyringStore {
    fn secret_for(username: &str) -> crate::libs::secret::Secret {
        crate::libs::secret::Secret::new(&format!("keyring-{username}"), "iCloud password")
    }

    fn path_for(username: &str) -> Result<std::path::PathBuf> {
        DataStorage::new().get_path(&format!("keyring-{username}"))
    }
}

impl KeyringStore for FileKeyringStore {
    fn get(&self, username: &str) -> Result<Option<String>> {
        Self::secret_for(username).try_get()
    }

    fn set(&self, username: &str, password: &str) -> Result<()> {
        Self::secret_for(username).store(password)
    }

    fn delete(&self, username: &str) -> Result<()> {
        let path = Self::path_for(username)?;
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}
