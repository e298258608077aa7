//! CLI command implementations.

mod auth;
mod checklist;
mod history_cmd;
mod sync_cmd;

pub use auth::{LoginCommand, LogoutCommand};
pub use checklist::{CheckCommand, SetCommand, ShowCommand};
pub use history_cmd::{HistoryCommand, RestoreCommand};
pub use sync_cmd::{PushCommand, StatusCommand, SyncCommand, WatchCommand};

use pack_track_core::{
    create_provider, CloudProvider, DocumentStore, FileStore, ProviderKind, SyncError,
};

use crate::config::Config;

/// Opens the file-backed document store under the configured data dir.
pub(crate) fn open_store(config: &Config) -> DocumentStore {
    DocumentStore::new(FileStore::new(config.data_dir.clone()))
}

/// Builds the provider for the stored configuration (or the default
/// backend when none is stored yet).
pub(crate) fn build_provider(
    config: &Config,
    store: &DocumentStore,
    auth_code: Option<String>,
) -> Result<Box<dyn CloudProvider>, SyncError> {
    let kind = store
        .sync_config()?
        .map(|c| c.provider)
        .unwrap_or(ProviderKind::GoogleDrive);
    create_provider(kind, config.oauth(), store.clone(), auth_code)
}

/// Formats an epoch-milliseconds timestamp for display.
pub(crate) fn format_ms(ms: i64) -> String {
    if ms == 0 {
        return "never".to_string();
    }
    match chrono::DateTime::from_timestamp_millis(ms) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => format!("{} ms", ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_ms() {
        assert_eq!(format_ms(0), "never");
        assert!(format_ms(1_700_000_000_000).starts_with("2023-11-14"));
    }
}
