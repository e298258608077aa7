//! Key-value persistence for the tracked document and sync metadata.
//!
//! The engine treats local persistence abstractly: named string values with
//! whole-value overwrite, no partial updates. `FileStore` is the production
//! adapter (one JSON file per key); `MemoryStore` backs tests.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use thiserror::Error;

/// Errors from the local key-value store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Abstract local persistence: get/set/remove of named string values.
pub trait LocalStore: Send + Sync {
    /// Reads a value, returning `None` when the key has never been written.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Deletes a value; deleting a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.values.lock().unwrap().remove(key);
        Ok(())
    }
}

/// File-backed store keeping one JSON file per key in a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at the given data directory.
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Returns the data directory path.
    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", key))
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io { path, source: e }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        // Ensure the data directory exists
        fs::create_dir_all(&self.data_dir).map_err(|e| StoreError::Io {
            path: self.data_dir.clone(),
            source: e,
        })?;

        let path = self.path(key);
        fs::write(&path, value).map_err(|e| StoreError::Io { path, source: e })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io { path, source: e }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (FileStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().join("data"));
        (store, temp_dir)
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("doc").unwrap(), None);

        store.set("doc", "{\"a\":1}").unwrap();
        assert_eq!(store.get("doc").unwrap(), Some("{\"a\":1}".to_string()));

        store.remove("doc").unwrap();
        assert_eq!(store.get("doc").unwrap(), None);
    }

    #[test]
    fn test_file_store_round_trip() {
        let (store, _dir) = test_store();

        assert_eq!(store.get("document").unwrap(), None);
        store.set("document", "{}").unwrap();
        assert_eq!(store.get("document").unwrap(), Some("{}".to_string()));

        store.set("document", "{\"v\":2}").unwrap();
        assert_eq!(store.get("document").unwrap(), Some("{\"v\":2}".to_string()));
    }

    #[test]
    fn test_file_store_creates_data_dir() {
        let (store, _dir) = test_store();
        assert!(!store.data_dir().exists());
        store.set("document", "{}").unwrap();
        assert!(store.data_dir().exists());
    }

    #[test]
    fn test_file_store_remove_missing_is_ok() {
        let (store, _dir) = test_store();
        store.remove("never-written").unwrap();
    }
}
