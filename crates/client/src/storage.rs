//! Durable credential storage.
//!
//! The bearer token survives process restart. The store is read once at
//! startup and written only by login/logout, but writes must still be atomic
//! so a crash mid-write can never leave a half-written value to be read on
//! the next start.
//!
//! A missing or corrupt file loads as `None` (anonymous), never an error.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Errors writing or clearing the persisted credential.
///
/// Loads are infallible: anything unreadable is treated as absent.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Durable client storage for the bearer credential.
///
/// Implementations must be atomic: a concurrent or interrupted write may
/// lose the value but must never expose a partial one.
pub trait CredentialStore: Send + Sync {
    /// Load the persisted token, if any. Corrupt data loads as `None`.
    fn load(&self) -> Option<String>;

    /// Persist the token, replacing any previous value atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the value could not be written.
    fn store(&self, token: &str) -> Result<(), StorageError>;

    /// Remove the persisted token.
    ///
    /// # Errors
    ///
    /// Returns an error if the value could not be removed.
    fn clear(&self) -> Result<(), StorageError>;
}

/// On-disk JSON blob holding the credential.
#[derive(Debug, Serialize, Deserialize)]
struct StoredCredential {
    token: String,
}

/// File-backed credential store.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// reader never observes a partially written file.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Create a store backed by the given file path.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Option<String> {
        let bytes = fs::read(&self.path).ok()?;
        match serde_json::from_slice::<StoredCredential>(&bytes) {
            Ok(stored) if !stored.token.is_empty() => Some(stored.token),
            Ok(_) => None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "corrupt credential file, treating as anonymous");
                None
            }
        }
    }

    fn store(&self, token: &str) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let blob = serde_json::to_vec(&StoredCredential {
            token: token.to_string(),
        })?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, blob)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory credential store for tests.
#[derive(Default)]
pub struct MemoryCredentialStore {
    token: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with a token, as if a previous session had
    /// persisted it.
    #[must_use]
    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Option<String> {
        self.token.lock().ok()?.clone()
    }

    fn store(&self, token: &str) -> Result<(), StorageError> {
        if let Ok(mut slot) = self.token.lock() {
            *slot = Some(token.to_string());
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        if let Ok(mut slot) = self.token.lock() {
            *slot = None;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("paperback-storage-{name}-{}", std::process::id()))
    }

    #[test]
    fn test_file_store_roundtrip() {
        let path = temp_path("roundtrip");
        let store = FileCredentialStore::new(path.clone());

        assert!(store.load().is_none());
        store.store("jwt-token-abc").unwrap();
        assert_eq!(store.load().as_deref(), Some("jwt-token-abc"));

        store.clear().unwrap();
        assert!(store.load().is_none());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_file_store_overwrite() {
        let path = temp_path("overwrite");
        let store = FileCredentialStore::new(path.clone());

        store.store("first").unwrap();
        store.store("second").unwrap();
        assert_eq!(store.load().as_deref(), Some("second"));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_corrupt_file_loads_as_anonymous() {
        let path = temp_path("corrupt");
        fs::write(&path, b"{not json").unwrap();

        let store = FileCredentialStore::new(path.clone());
        assert!(store.load().is_none());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_empty_token_loads_as_anonymous() {
        let path = temp_path("empty");
        fs::write(&path, br#"{"token":""}"#).unwrap();

        let store = FileCredentialStore::new(path.clone());
        assert!(store.load().is_none());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_clear_missing_file_is_ok() {
        let store = FileCredentialStore::new(temp_path("never-written"));
        assert!(store.clear().is_ok());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryCredentialStore::with_token("seeded");
        assert_eq!(store.load().as_deref(), Some("seeded"));
        store.store("replaced").unwrap();
        assert_eq!(store.load().as_deref(), Some("replaced"));
        store.clear().unwrap();
        assert!(store.load().is_none());
    }
}
