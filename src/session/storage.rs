//! Durable key/value storage for the session credential

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::StorageError;

/// Stored entries, keyed by fixed names (`access_token`, `user`)
pub type Entries = BTreeMap<String, String>;

/// Backing store for [`TokenStore`](super::TokenStore)
///
/// Implementations persist the whole entry map at once so that the token and
/// the profile are always written together.
pub trait CredentialStorage: Send + Sync {
    /// Load all entries. Missing or unreadable data yields an empty map.
    fn load(&self) -> Result<Entries, StorageError>;

    /// Replace all entries
    fn persist(&self, entries: &Entries) -> Result<(), StorageError>;
}

/// JSON file storage, survives process restarts
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStorage for FileStorage {
    fn load(&self) -> Result<Entries, StorageError> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&data) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!("Ignoring corrupt session file {}: {}", self.path.display(), e);
                Ok(Entries::new())
            }
        }
    }

    fn persist(&self, entries: &Entries) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let data = serde_json::to_string_pretty(entries)?;

        // Write atomically via temp file
        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, data)?;
        std::fs::rename(&temp_path, &self.path)?;

        debug!("Session file written: {}", self.path.display());
        Ok(())
    }
}

/// Process-local storage (tests, one-shot sessions)
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<Entries>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with raw entries
    pub fn with_entries(entries: Entries) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }
}

impl CredentialStorage for MemoryStorage {
    fn load(&self) -> Result<Entries, StorageError> {
        Ok(self.entries.lock().clone())
    }

    fn persist(&self, entries: &Entries) -> Result<(), StorageError> {
        *self.entries.lock() = entries.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_storage_roundtrip() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested").join("session.json"));

        assert!(storage.load().unwrap().is_empty());

        let mut entries = Entries::new();
        entries.insert("access_token".into(), "tok1".into());
        storage.persist(&entries).unwrap();

        let loaded = storage.load().unwrap();
        assert_eq!(loaded.get("access_token").map(String::as_str), Some("tok1"));
        assert!(!storage.path().with_extension("tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_treated_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();

        let storage = FileStorage::new(path);
        assert!(storage.load().unwrap().is_empty());
    }
}
