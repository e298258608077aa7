//! Login and logout commands for the cloud backend.

use clap::Args;

use pack_track_core::{consent_url, create_provider, ProviderKind, SyncCoordinator};

use super::open_store;
use crate::config::Config;

type CommandError = Box<dyn std::error::Error>;

/// Sign in to a cloud backend
#[derive(Debug, Args)]
pub struct LoginCommand {
    /// Cloud backend to use
    #[arg(long, default_value = "google-drive")]
    provider: String,

    /// Authorization code obtained from the consent URL
    #[arg(long)]
    code: Option<String>,
}

impl LoginCommand {
    pub async fn run(&self, config: &Config) -> Result<(), CommandError> {
        let kind: ProviderKind = self
            .provider
            .parse()
            .map_err(Box::<dyn std::error::Error>::from)?;

        if config.google_client_id.is_empty() {
            return Err(
                "google_client_id is not configured; add it to the config file".into(),
            );
        }

        let store = open_store(config);
        let provider = create_provider(kind, config.oauth(), store.clone(), self.code.clone())?;

        if self.code.is_none() {
            println!("Visit this URL to authorize PackTrack:");
            println!();
            println!("  {}", consent_url(&config.oauth()));
            println!();
            println!("Then run: packtrack login --code <authorization-code>");
            return Ok(());
        }

        let identity = provider.authenticate(true).await?;
        println!("Signed in as {}", identity.account);

        // First reconcile: adopt whatever this account already has.
        let coordinator = SyncCoordinator::new(store, config.sync_options());
        let changed = coordinator.activate(provider).await?;
        if changed {
            println!("Local data updated from remote.");
        } else {
            println!("Sync initialized.");
        }
        Ok(())
    }
}

/// Sign out and discard stored credentials (local data is kept)
#[derive(Debug, Args)]
pub struct LogoutCommand {}

impl LogoutCommand {
    pub async fn run(&self, config: &Config) -> Result<(), CommandError> {
        let store = open_store(config);
        if store.sync_config()?.is_none() {
            println!("Not signed in.");
            return Ok(());
        }

        let coordinator = SyncCoordinator::new(store, config.sync_options());
        coordinator.deactivate().await?;
        println!("Signed out. Local data was kept.");
        Ok(())
    }
}
