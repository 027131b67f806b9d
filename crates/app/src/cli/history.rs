use std::{path::PathBuf, sync::Arc};

use cartwatch::transfer;
use cartwatch_app::{
    config::{StorageConfig, StorefrontConfig, TrackingConfig},
    repositories::HistoryRepository,
    storage::FileStore,
    tracker::CartStateTracker,
};
use clap::{Args, Subcommand};

use super::{render, write_file};

#[derive(Debug, Args)]
pub(crate) struct HistoryCommand {
    #[command(flatten)]
    storage: StorageConfig,

    #[command(subcommand)]
    command: HistorySubcommand,
}

#[derive(Debug, Subcommand)]
enum HistorySubcommand {
    /// List recorded cart changes
    List,
    /// Write the history to a JSON backup
    Export {
        /// Backup file to write
        #[arg(long)]
        out: PathBuf,
    },
    /// Delete the stored history
    Clear,
    /// Replay a recorded cart onto the storefront
    Restore(RestoreArgs),
}

#[derive(Debug, Args)]
struct RestoreArgs {
    #[command(flatten)]
    storefront: StorefrontConfig,

    #[command(flatten)]
    tracking: TrackingConfig,

    /// Entry to restore, as numbered by `history list`
    #[arg(long)]
    index: usize,
}

pub(crate) async fn run(command: HistoryCommand) -> Result<(), String> {
    let repository = HistoryRepository::new(Arc::new(FileStore::new(&command.storage.data_dir)));

    match command.command {
        HistorySubcommand::List => {
            let entries = load(&repository).await?;

            println!("{}", render::history_table(&entries));
        }
        HistorySubcommand::Export { out } => {
            let entries = load(&repository).await?;
            let json = transfer::export_history_json(&entries)
                .map_err(|error| format!("failed to export history: {error}"))?;

            write_file(&out, json).await?;

            println!("exported {} entries to {}", entries.len(), out.display());
        }
        HistorySubcommand::Clear => {
            repository
                .clear()
                .await
                .map_err(|error| format!("failed to clear history: {error}"))?;

            println!("history cleared");
        }
        HistorySubcommand::Restore(args) => restore(repository, args).await?,
    }

    Ok(())
}

async fn load(repository: &HistoryRepository) -> Result<Vec<cartwatch::history::HistoryEntry>, String> {
    repository
        .load()
        .await
        .map_err(|error| format!("failed to load history: {error}"))
}

async fn restore(repository: HistoryRepository, args: RestoreArgs) -> Result<(), String> {
    let entries = load(&repository).await?;
    let entry = entries
        .get(args.index)
        .ok_or_else(|| format!("no history entry {}", args.index))?;

    let adapter = args
        .storefront
        .adapter()
        .map_err(|error| format!("failed to create storefront client: {error}"))?;

    let tracker = CartStateTracker::new(Arc::new(adapter), repository, args.tracking.tracker());

    tracker
        .load_history()
        .await
        .map_err(|error| format!("failed to load history: {error}"))?;

    let restored = tracker
        .restore(entry)
        .await
        .map_err(|error| format!("{error}: {}", error_source(&error)))?;

    println!(
        "restored {} items, {}",
        restored.item_count,
        render::cart_total(&restored)
    );

    Ok(())
}

fn error_source(error: &dyn std::error::Error) -> String {
    error
        .source()
        .map_or_else(String::new, ToString::to_string)
}
