//! Commands that edit and display checklist items.

use clap::Args;
use serde_json::{json, Value};

use super::open_store;
use crate::config::Config;

type CommandError = Box<dyn std::error::Error>;

/// Mark a checklist item packed (or unpacked with --off)
#[derive(Debug, Args)]
pub struct CheckCommand {
    /// Profile the item belongs to
    profile: String,

    /// Item identifier
    item: String,

    /// Mark the item unpacked instead
    #[arg(long)]
    off: bool,
}

impl CheckCommand {
    pub async fn run(&self, config: &Config) -> Result<(), CommandError> {
        let store = open_store(config);
        store.set_item(&self.profile, &self.item, json!(!self.off))?;
        println!(
            "{} {} in {}",
            if self.off { "Unpacked" } else { "Packed" },
            self.item,
            self.profile
        );
        Ok(())
    }
}

/// Set a checklist item to an arbitrary value
#[derive(Debug, Args)]
pub struct SetCommand {
    /// Profile the item belongs to
    profile: String,

    /// Item identifier
    item: String,

    /// New value (parsed as JSON, or stored as a string)
    value: String,
}

impl SetCommand {
    pub async fn run(&self, config: &Config) -> Result<(), CommandError> {
        let value: Value = serde_json::from_str(&self.value)
            .unwrap_or_else(|_| Value::String(self.value.clone()));

        let store = open_store(config);
        store.set_item(&self.profile, &self.item, value)?;
        println!("Set {} in {}", self.item, self.profile);
        Ok(())
    }
}

/// Show checklist items, for one profile or all of them
#[derive(Debug, Args)]
pub struct ShowCommand {
    /// Profile to show (all profiles if omitted)
    profile: Option<String>,
}

impl ShowCommand {
    pub async fn run(&self, config: &Config) -> Result<(), CommandError> {
        let store = open_store(config);
        let doc = store.document()?;

        if doc.profiles.is_empty() {
            println!("No profiles yet.");
            return Ok(());
        }

        for (name, profile) in &doc.profiles {
            if let Some(wanted) = &self.profile {
                if wanted != name {
                    continue;
                }
            }
            println!("{}:", name);
            if profile.checklist_data.is_empty() {
                println!("  (empty)");
            }
            for (item, value) in &profile.checklist_data {
                println!("  {} = {}", item, value);
            }
        }
        Ok(())
    }
}
