use cartwatch_app::{config::LoggingConfig, observability};
use clap::{Parser, Subcommand};

mod check;
mod diff;
mod history;
mod render;
mod watch;

#[derive(Debug, Parser)]
#[command(name = "cartwatch", about = "Cart change tracking and validation", long_about = None)]
pub(crate) struct Cli {
    #[command(flatten)]
    logging: LoggingConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compare two cart snapshots
    Diff(diff::DiffArgs),
    /// Run cart tests against a snapshot
    Check(check::CheckArgs),
    /// Manage the stored test collection
    Tests(tests::TestsCommand),
    /// Manage the stored cart history
    History(history::HistoryCommand),
    /// Poll a storefront cart and validate every change
    Watch(watch::WatchArgs),
}

impl Cli {
    pub(crate) async fn run(self) -> Result<(), String> {
        observability::init_subscriber(&self.logging)
            .map_err(|error| format!("failed to initialise logging: {error}"))?;

        match self.command {
            Commands::Diff(args) => diff::run(args).await,
            Commands::Check(args) => check::run(args).await,
            Commands::Tests(command) => tests::run(command).await,
            Commands::History(command) => history::run(command).await,
            Commands::Watch(args) => watch::run(args).await,
        }
    }
}

async fn read_file(path: &std::path::Path) -> Result<String, String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|error| format!("failed to read {}: {error}", path.display()))
}

async fn write_file(path: &std::path::Path, contents: String) -> Result<(), String> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|error| format!("failed to write {}: {error}", path.display()))
}

async fn read_snapshot(path: &std::path::Path) -> Result<cartwatch::cart::CartSnapshot, String> {
    cartwatch::cart::CartSnapshot::from_json(&read_file(path).await?)
        .map_err(|error| format!("invalid cart in {}: {error}", path.display()))
}
