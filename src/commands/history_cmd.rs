//! Version history listing and restore.

use clap::Args;

use pack_track_core::{HistoryLog, SyncCoordinator};

use super::{format_ms, open_store};
use crate::config::Config;

type CommandError = Box<dyn std::error::Error>;

/// List recent synced versions, newest first
#[derive(Debug, Args)]
pub struct HistoryCommand {}

impl HistoryCommand {
    pub async fn run(&self, config: &Config) -> Result<(), CommandError> {
        let store = open_store(config);
        let log = HistoryLog::new(store, config.history_cap);
        let entries = log.entries()?;

        if entries.is_empty() {
            println!("No synced versions yet.");
            return Ok(());
        }
        for (index, entry) in entries.iter().enumerate() {
            println!(
                "{:>3}  version {:<5} {}",
                index,
                entry.document.sync_meta.version,
                format_ms(entry.timestamp)
            );
        }
        Ok(())
    }
}

/// Restore a previous synced version as the live document
#[derive(Debug, Args)]
pub struct RestoreCommand {
    /// Index from `packtrack history` (0 is the newest)
    index: usize,
}

impl RestoreCommand {
    pub async fn run(&self, config: &Config) -> Result<(), CommandError> {
        let store = open_store(config);
        let coordinator = SyncCoordinator::new(store, config.sync_options());
        coordinator.restore(self.index)?;

        let doc = coordinator.store().document()?;
        println!(
            "Restored version {}. Run `packtrack push` to upload it.",
            doc.sync_meta.version
        );
        Ok(())
    }
}
