use std::sync::Arc;

use cartwatch_app::{
    config::{StorageConfig, StorefrontConfig, TrackingConfig},
    poller::Poller,
    repositories::{HistoryRepository, TestsRepository},
    runner::{LogSink, TestRunner},
    storage::{FileStore, KeyValueStore},
    tracker::CartStateTracker,
};
use clap::Args;
use tracing::info;

#[derive(Debug, Args)]
pub(crate) struct WatchArgs {
    #[command(flatten)]
    storefront: StorefrontConfig,

    #[command(flatten)]
    storage: StorageConfig,

    #[command(flatten)]
    tracking: TrackingConfig,
}

pub(crate) async fn run(args: WatchArgs) -> Result<(), String> {
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(&args.storage.data_dir));
    let adapter = args
        .storefront
        .adapter()
        .map_err(|error| format!("failed to create storefront client: {error}"))?;

    let tracker = Arc::new(CartStateTracker::new(
        Arc::new(adapter),
        HistoryRepository::new(Arc::clone(&store)),
        args.tracking.tracker(),
    ));

    tracker
        .load_history()
        .await
        .map_err(|error| format!("failed to load history: {error}"))?;

    let runner = Arc::new(
        TestRunner::load(TestsRepository::new(store), Arc::new(LogSink))
            .await
            .map_err(|error| format!("failed to load tests: {error}"))?,
    );

    let _results = runner.attach(&tracker);
    let _changes = tracker.subscribe(|snapshot, diff| {
        info!(
            summary = %diff.summary(),
            items = snapshot.item_count,
            total_price = snapshot.total_price,
            "cart changed"
        );
        Ok(())
    });

    let poller = Poller::spawn(Arc::clone(&tracker), args.tracking.poll_interval());

    tokio::signal::ctrl_c()
        .await
        .map_err(|error| format!("failed to wait for ctrl-c: {error}"))?;

    info!("ctrl_c signal received");

    poller.stop().await;

    Ok(())
}
