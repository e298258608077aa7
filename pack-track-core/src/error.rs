//! Error types for sync operations.

use thiserror::Error;

use crate::storage::StoreError;

/// Errors that can occur during synchronization.
///
/// The taxonomy matters for retry behavior: `Auth` errors require user
/// action (a fresh login) and are never silently retried, while `Network`
/// errors are transient and retried on the next periodic tick or local
/// change.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Credential missing, expired, or denied
    #[error("authentication required: {0}")]
    Auth(String),

    /// Transient network or backend failure
    #[error("network error: {0}")]
    Network(String),

    /// Local store read/write failed
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// JSON encoding/decoding failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Requested backend has no implementation yet
    #[error("provider '{0}' is not supported yet")]
    ProviderUnsupported(String),

    /// No provider is active
    #[error("sync is not configured; run login first")]
    NotConfigured,

    /// History index out of range
    #[error("no history snapshot at index {0}")]
    SnapshotNotFound(usize),
}

impl SyncError {
    /// Whether this error can be cleared by re-authenticating.
    pub fn is_auth(&self) -> bool {
        matches!(self, SyncError::Auth(_))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        SyncError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_classification() {
        assert!(SyncError::Auth("token expired".to_string()).is_auth());
        assert!(!SyncError::Network("connection refused".to_string()).is_auth());
        assert!(!SyncError::NotConfigured.is_auth());
    }

    #[test]
    fn test_display_messages() {
        let err = SyncError::ProviderUnsupported("dropbox".to_string());
        assert_eq!(err.to_string(), "provider 'dropbox' is not supported yet");

        let err = SyncError::SnapshotNotFound(4);
        assert_eq!(err.to_string(), "no history snapshot at index 4");
    }
}
