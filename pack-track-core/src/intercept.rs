//! Typed document access with change interception.
//!
//! [`DocumentStore`] wraps a [`LocalStore`] and owns the well-known keys.
//! Local mutations flow through it so that per-item timestamps are stamped
//! at the moment of the edit, and registered observers (the sync
//! coordinator) are notified of every user-driven write. The coordinator
//! writes sync results back through [`DocumentStore::apply_synced`], which
//! deliberately skips notification so applying a merged or pushed document
//! can never re-trigger a sync.

use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::SyncConfig;
use crate::document::{now_ms, Document};
use crate::error::SyncError;
use crate::storage::LocalStore;

/// Store key holding the live document.
pub const DOCUMENT_KEY: &str = "document";
/// Store key holding the persisted provider credentials/state.
pub const SYNC_CONFIG_KEY: &str = "sync_config";
/// Store key holding the version history ring.
pub const SYNC_HISTORY_KEY: &str = "sync_history";

/// What kind of local mutation an observer is being told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A single checklist item was toggled or edited
    Item,
    /// The whole document was replaced
    Document,
}

type Observer = Box<dyn Fn(ChangeKind) + Send + Sync>;

struct Inner {
    store: Box<dyn LocalStore>,
    observers: Mutex<Vec<Observer>>,
}

/// Shared handle to the tracked document and its sync metadata.
#[derive(Clone)]
pub struct DocumentStore {
    inner: Arc<Inner>,
}

impl DocumentStore {
    pub fn new(store: impl LocalStore + 'static) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: Box::new(store),
                observers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Registers an observer called synchronously after every user-driven
    /// write. Sync write-backs do not notify.
    pub fn subscribe(&self, observer: impl Fn(ChangeKind) + Send + Sync + 'static) {
        self.inner.observers.lock().unwrap().push(Box::new(observer));
    }

    fn notify(&self, kind: ChangeKind) {
        for observer in self.inner.observers.lock().unwrap().iter() {
            observer(kind);
        }
    }

    pub(crate) fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SyncError> {
        match self.inner.store.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn write_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), SyncError> {
        let raw = serde_json::to_string(value)?;
        self.inner.store.set(key, &raw)?;
        Ok(())
    }

    /// Returns the live document, or an empty one if none has been written.
    pub fn document(&self) -> Result<Document, SyncError> {
        Ok(self.read_json(DOCUMENT_KEY)?.unwrap_or_default())
    }

    /// Sets a checklist item, stamping its per-item timestamp, and notifies
    /// observers of the edit.
    pub fn set_item(
        &self,
        profile: &str,
        item_id: &str,
        value: Value,
    ) -> Result<(), SyncError> {
        let mut doc = self.document()?;
        doc.profile_mut(profile).set_item(item_id, value, now_ms());
        self.write_json(DOCUMENT_KEY, &doc)?;
        self.notify(ChangeKind::Item);
        Ok(())
    }

    /// Replaces the whole document (a restore, an import, a settings edit)
    /// and notifies observers unconditionally.
    pub fn put_document(&self, doc: &Document) -> Result<(), SyncError> {
        self.write_json(DOCUMENT_KEY, doc)?;
        self.notify(ChangeKind::Document);
        Ok(())
    }

    /// Writes a document produced by a sync cycle without notifying.
    ///
    /// This is the re-entrancy guard: only the coordinator calls it, and
    /// because it never notifies, applying sync results cannot loop back
    /// into another sync.
    pub fn apply_synced(&self, doc: &Document) -> Result<(), SyncError> {
        self.write_json(DOCUMENT_KEY, doc)
    }

    /// Returns the persisted provider configuration, if any.
    pub fn sync_config(&self) -> Result<Option<SyncConfig>, SyncError> {
        self.read_json(SYNC_CONFIG_KEY)
    }

    pub fn put_sync_config(&self, config: &SyncConfig) -> Result<(), SyncError> {
        self.write_json(SYNC_CONFIG_KEY, config)
    }

    /// Deletes the persisted credentials (deactivation).
    pub fn clear_sync_config(&self) -> Result<(), SyncError> {
        self.inner.store.remove(SYNC_CONFIG_KEY)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;
    use crate::storage::MemoryStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counted_store() -> (DocumentStore, Arc<AtomicUsize>) {
        let store = DocumentStore::new(MemoryStore::new());
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        store.subscribe(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        (store, count)
    }

    #[test]
    fn test_empty_store_yields_default_document() {
        let store = DocumentStore::new(MemoryStore::new());
        let doc = store.document().unwrap();
        assert!(doc.profiles.is_empty());
        assert_eq!(doc.sync_meta.version, 0);
    }

    #[test]
    fn test_set_item_stamps_and_notifies() {
        let (store, count) = counted_store();

        store.set_item("Trip", "passport", json!(true)).unwrap();

        let doc = store.document().unwrap();
        let profile = &doc.profiles["Trip"];
        assert_eq!(profile.item("passport"), Some(&json!(true)));
        assert!(profile.item_timestamp("passport") > 0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_put_document_notifies() {
        let (store, count) = counted_store();
        store.put_document(&Document::default()).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_apply_synced_does_not_notify() {
        let (store, count) = counted_store();

        let mut doc = Document::default();
        doc.sync_meta.version = 5;
        store.apply_synced(&doc).unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(store.document().unwrap().sync_meta.version, 5);
    }

    #[test]
    fn test_sync_config_lifecycle() {
        let store = DocumentStore::new(MemoryStore::new());
        assert!(store.sync_config().unwrap().is_none());

        let config = SyncConfig::new(ProviderKind::GoogleDrive);
        store.put_sync_config(&config).unwrap();
        assert_eq!(store.sync_config().unwrap(), Some(config));

        store.clear_sync_config().unwrap();
        assert!(store.sync_config().unwrap().is_none());
    }

    #[test]
    fn test_multiple_observers_all_fire() {
        let store = DocumentStore::new(MemoryStore::new());
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let count = count.clone();
            store.subscribe(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        store.set_item("Trip", "tent", json!(false)).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
