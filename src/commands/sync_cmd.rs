//! Manual sync, status, and watch commands.

use clap::Args;
use tracing::info;

use pack_track_core::SyncCoordinator;

use super::{build_provider, format_ms, open_store};
use crate::config::Config;

type CommandError = Box<dyn std::error::Error>;

/// Pull the remote document and merge it with local edits
#[derive(Debug, Args)]
pub struct SyncCommand {}

impl SyncCommand {
    pub async fn run(&self, config: &Config) -> Result<(), CommandError> {
        let store = open_store(config);
        if store.sync_config()?.is_none() {
            return Err("not signed in; run `packtrack login` first".into());
        }

        let provider = build_provider(config, &store, None)?;
        let coordinator = SyncCoordinator::new(store, config.sync_options());
        let changed = coordinator.activate(provider).await?;

        let doc = coordinator.store().document()?;
        if changed {
            println!("Local data updated (version {}).", doc.sync_meta.version);
        } else {
            println!("Already up to date (version {}).", doc.sync_meta.version);
        }
        Ok(())
    }
}

/// Push the local document to the cloud backend
#[derive(Debug, Args)]
pub struct PushCommand {}

impl PushCommand {
    pub async fn run(&self, config: &Config) -> Result<(), CommandError> {
        let store = open_store(config);
        if store.sync_config()?.is_none() {
            return Err("not signed in; run `packtrack login` first".into());
        }

        let provider = build_provider(config, &store, None)?;
        let coordinator = SyncCoordinator::new(store, config.sync_options());
        coordinator.attach(provider).await;
        coordinator.sync_now().await?;

        let doc = coordinator.store().document()?;
        println!("Pushed version {}.", doc.sync_meta.version);
        Ok(())
    }
}

/// Show sync configuration and document state
#[derive(Debug, Args)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn run(&self, config: &Config) -> Result<(), CommandError> {
        let store = open_store(config);
        let doc = store.document()?;

        match store.sync_config()? {
            Some(sync) => {
                println!("Provider:   {}", sync.provider);
                println!(
                    "Account:    {}",
                    sync.account.as_deref().unwrap_or("(unknown)")
                );
                println!(
                    "Remote:     {}",
                    sync.remote_file_id.as_deref().unwrap_or("(not created)")
                );
            }
            None => println!("Provider:   not signed in"),
        }
        println!("Version:    {}", doc.sync_meta.version);
        println!("Last sync:  {}", format_ms(doc.sync_meta.last_sync_at));
        println!("Profiles:   {}", doc.profiles.len());
        Ok(())
    }
}

/// Run in the foreground, syncing edits as they land
#[derive(Debug, Args)]
pub struct WatchCommand {}

impl WatchCommand {
    pub async fn run(&self, config: &Config) -> Result<(), CommandError> {
        let store = open_store(config);
        if store.sync_config()?.is_none() {
            return Err("not signed in; run `packtrack login` first".into());
        }

        let provider = build_provider(config, &store, None)?;
        let coordinator = SyncCoordinator::new(store, config.sync_options());
        coordinator.activate(provider).await?;
        info!("watching for changes; press Ctrl-C to stop");
        println!("Watching for changes (Ctrl-C to stop)...");

        tokio::signal::ctrl_c().await?;

        // Push anything still buffered in the debounce window before exit.
        if coordinator.flush().await? {
            println!("Flushed pending changes.");
        }
        println!("Stopped.");
        Ok(())
    }
}
