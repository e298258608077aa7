use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{
    CheckCommand, HistoryCommand, LoginCommand, LogoutCommand, PushCommand, RestoreCommand,
    SetCommand, ShowCommand, StatusCommand, SyncCommand, WatchCommand,
};
use config::Config;

#[derive(Parser)]
#[command(name = "packtrack")]
#[command(version)]
#[command(about = "A packing checklist that syncs across devices", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in to a cloud backend
    Login(LoginCommand),

    /// Sign out, keeping local data
    Logout(LogoutCommand),

    /// Pull the remote document and merge it with local edits
    Sync(SyncCommand),

    /// Push the local document to the cloud backend
    Push(PushCommand),

    /// Show sync configuration and document state
    Status(StatusCommand),

    /// Mark a checklist item packed
    Check(CheckCommand),

    /// Set a checklist item to an arbitrary value
    Set(SetCommand),

    /// Show checklist items
    Show(ShowCommand),

    /// List recent synced versions
    History(HistoryCommand),

    /// Restore a previous synced version
    Restore(RestoreCommand),

    /// Run in the foreground, syncing edits as they land
    Watch(WatchCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::Login(cmd)) => cmd.run(&config).await?,
        Some(Commands::Logout(cmd)) => cmd.run(&config).await?,
        Some(Commands::Sync(cmd)) => cmd.run(&config).await?,
        Some(Commands::Push(cmd)) => cmd.run(&config).await?,
        Some(Commands::Status(cmd)) => cmd.run(&config).await?,
        Some(Commands::Check(cmd)) => cmd.run(&config).await?,
        Some(Commands::Set(cmd)) => cmd.run(&config).await?,
        Some(Commands::Show(cmd)) => cmd.run(&config).await?,
        Some(Commands::History(cmd)) => cmd.run(&config).await?,
        Some(Commands::Restore(cmd)) => cmd.run(&config).await?,
        Some(Commands::Watch(cmd)) => cmd.run(&config).await?,
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
