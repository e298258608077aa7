//! PackTrack Core Library
//!
//! The synchronization engine behind PackTrack: a local packing-checklist
//! document kept consistent with a single remote copy through a pluggable
//! cloud backend. Edits made offline on several devices reconcile
//! deterministically with a per-item last-writer-wins merge; there is no
//! central server and no locking.

pub mod config;
pub mod coordinator;
pub mod document;
pub mod error;
pub mod history;
pub mod intercept;
pub mod merge;
pub mod provider;
pub mod storage;

pub use config::{ProviderKind, SyncConfig, SyncOptions};
pub use coordinator::{SyncCoordinator, SyncState};
pub use document::{now_ms, Document, Profile, ProfileSyncMeta, SyncMeta};
pub use error::SyncError;
pub use history::{HistoryLog, VersionSnapshot};
pub use intercept::{ChangeKind, DocumentStore};
pub use merge::merge;
pub use provider::{consent_url, create_provider, CloudProvider, Identity, OauthApp, RemoteRef};
pub use storage::{FileStore, LocalStore, MemoryStore, StoreError};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
