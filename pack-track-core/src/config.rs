//! Persisted sync configuration and tunable scheduling options.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Supported cloud backends.
///
/// Adding a backend means implementing [`crate::provider::CloudProvider`]
/// and extending the single construction site in `provider::create_provider`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    GoogleDrive,
    /// Declared but not implemented yet
    Dropbox,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::GoogleDrive => "google-drive",
            ProviderKind::Dropbox => "dropbox",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google-drive" => Ok(ProviderKind::GoogleDrive),
            "dropbox" => Ok(ProviderKind::Dropbox),
            other => Err(format!("unknown provider '{}'", other)),
        }
    }
}

/// Credentials and remote-object state for the active provider.
///
/// Created on successful authentication, mutated on token refresh and on
/// remote-file discovery, deleted on deactivation. Persisting these means
/// a process restart skips both consent and file discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub provider: ProviderKind,
    /// Account identity (e-mail) reported by the backend
    pub account: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Access-token expiry in epoch milliseconds (0 = never obtained)
    #[serde(default)]
    pub token_expires_at: i64,
    /// Backend identifier of the singleton remote file, once discovered
    pub remote_file_id: Option<String>,
}

impl SyncConfig {
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            account: None,
            access_token: None,
            refresh_token: None,
            token_expires_at: 0,
            remote_file_id: None,
        }
    }

    /// Whether the cached access token is still usable at `now_ms`,
    /// applying a safety margin so a token about to expire is refreshed
    /// instead of failing mid-request.
    pub fn token_valid(&self, now_ms: i64, margin_ms: i64) -> bool {
        self.access_token.is_some() && now_ms + margin_ms < self.token_expires_at
    }
}

/// Scheduling knobs for the sync coordinator.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Delay collapsing rapid successive changes into one push
    pub debounce: Duration,
    /// Safety-net interval that retries while changes are pending
    pub periodic: Duration,
    /// Maximum number of retained version snapshots
    pub history_cap: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(5000),
            periodic: Duration::from_millis(120_000),
            history_cap: 10,
        }
    }
}
