//! Pluggable cloud backends.
//!
//! A backend only has to do three things: authenticate, upload the
//! document to a private singleton object, and download it back (or report
//! that it does not exist yet). The coordinator talks to a
//! `Box<dyn CloudProvider>` and never branches on the backend name;
//! [`create_provider`] is the single construction site.

mod google_drive;

use async_trait::async_trait;

pub use google_drive::{consent_url, GoogleDriveProvider};

use crate::config::ProviderKind;
use crate::document::Document;
use crate::error::SyncError;
use crate::intercept::DocumentStore;

/// Account identity reported by a backend after authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub account: String,
}

/// Backend handle of the remote document object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    pub file_id: String,
}

/// OAuth application credentials for backends that need them.
#[derive(Debug, Clone)]
pub struct OauthApp {
    pub client_id: String,
    pub client_secret: String,
}

/// Capability contract every cloud backend implements.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Obtains or refreshes a credential.
    ///
    /// Idempotent while a cached credential is still valid (checked with a
    /// safety margin before expiry). `interactive` forces a fresh user
    /// grant, ignoring any cached credential.
    async fn authenticate(&self, interactive: bool) -> Result<Identity, SyncError>;

    /// Serializes the document and writes it to the backend's private
    /// storage area. The first push creates the remote object and caches
    /// its identifier; later pushes update it in place.
    async fn push(&self, document: &Document) -> Result<RemoteRef, SyncError>;

    /// Downloads the remote document. Returns `Ok(None)` exactly when no
    /// remote object exists yet, distinguishing "never synced" from an
    /// empty document.
    async fn pull(&self) -> Result<Option<Document>, SyncError>;
}

/// Builds the provider for a backend kind.
///
/// `auth_code` is an authorization code obtained out of band (the `login`
/// flow); it is consumed by the first interactive authentication.
pub fn create_provider(
    kind: ProviderKind,
    oauth: OauthApp,
    store: DocumentStore,
    auth_code: Option<String>,
) -> Result<Box<dyn CloudProvider>, SyncError> {
    match kind {
        ProviderKind::GoogleDrive => {
            Ok(Box::new(GoogleDriveProvider::new(oauth, store, auth_code)))
        }
        ProviderKind::Dropbox => Err(SyncError::ProviderUnsupported(kind.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn oauth() -> OauthApp {
        OauthApp {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
        }
    }

    #[test]
    fn test_google_drive_constructs() {
        let store = DocumentStore::new(MemoryStore::new());
        assert!(create_provider(ProviderKind::GoogleDrive, oauth(), store, None).is_ok());
    }

    #[test]
    fn test_dropbox_is_a_stub() {
        let store = DocumentStore::new(MemoryStore::new());
        match create_provider(ProviderKind::Dropbox, oauth(), store, None) {
            Err(SyncError::ProviderUnsupported(name)) => assert_eq!(name, "dropbox"),
            _ => panic!("expected ProviderUnsupported"),
        }
    }
}
