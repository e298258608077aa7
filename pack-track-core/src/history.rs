//! Capped version history of successfully pushed documents.

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::SyncError;
use crate::intercept::{DocumentStore, SYNC_HISTORY_KEY};

/// An immutable copy of the document taken after a successful push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionSnapshot {
    /// When the snapshot was recorded, in epoch milliseconds
    pub timestamp: i64,
    pub document: Document,
}

/// Newest-first ring of [`VersionSnapshot`]s persisted in the local store.
pub struct HistoryLog {
    store: DocumentStore,
    cap: usize,
}

impl HistoryLog {
    pub fn new(store: DocumentStore, cap: usize) -> Self {
        Self { store, cap }
    }

    /// Returns all snapshots, newest first.
    pub fn entries(&self) -> Result<Vec<VersionSnapshot>, SyncError> {
        Ok(self.store.read_json(SYNC_HISTORY_KEY)?.unwrap_or_default())
    }

    /// Prepends a snapshot and drops the oldest entries beyond the cap.
    pub fn record(&self, document: &Document, timestamp: i64) -> Result<(), SyncError> {
        let mut entries = self.entries()?;
        entries.insert(
            0,
            VersionSnapshot {
                timestamp,
                document: document.clone(),
            },
        );
        entries.truncate(self.cap);
        self.store.write_json(SYNC_HISTORY_KEY, &entries)
    }

    /// Returns the snapshot at `index` (0 = newest).
    pub fn snapshot(&self, index: usize) -> Result<VersionSnapshot, SyncError> {
        self.entries()?
            .into_iter()
            .nth(index)
            .ok_or(SyncError::SnapshotNotFound(index))
    }
}
