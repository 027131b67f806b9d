//! Poller
//!
//! Refreshes the tracker on a fixed interval until stopped.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::tracker::CartStateTracker;

/// A running refresh loop.
#[derive(Debug)]
pub struct Poller {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Poller {
    /// Start refreshing `tracker` every `interval`, beginning immediately.
    #[must_use]
    pub fn spawn(tracker: Arc<CartStateTracker>, interval: Duration) -> Self {
        let (stop, mut stopped) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticks = time::interval(interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(interval_ms = interval.as_millis(), "cart poller started");

            loop {
                tokio::select! {
                    _ = ticks.tick() => match tracker.refresh().await {
                        Ok(Some(diff)) => debug!(summary = %diff.summary(), "cart changed"),
                        Ok(None) => {}
                        Err(error) => warn!(%error, "cart refresh failed"),
                    },
                    _ = stopped.changed() => break,
                }
            }

            info!("cart poller stopped");
        });

        Self { stop, handle }
    }

    /// Stop the loop, waiting for an in-flight refresh to finish.
    pub async fn stop(self) {
        let _sent = self.stop.send(true);

        if let Err(error) = self.handle.await {
            warn!(%error, "cart poller task failed");
        }
    }
}
