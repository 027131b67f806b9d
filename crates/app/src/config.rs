//! Configuration
//!
//! Command-line arguments with environment fallbacks. A `.env` file in the
//! working directory is loaded before parsing.

use std::{path::PathBuf, time::Duration};

use cartwatch::history::DEFAULT_HISTORY_LIMIT;
use clap::Args;

use crate::{
    adapter::{AdapterError, HttpCartAdapter},
    tracker::TrackerConfig,
};

/// Log output format.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum LogFormat {
    /// Compact, human-readable logs.
    Compact,

    /// Structured JSON logs.
    Json,
}

/// Logging settings.
#[derive(Debug, Args)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "info", global = true)]
    pub log_level: String,

    /// Log format (compact, json)
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact, global = true)]
    pub log_format: LogFormat,
}

/// Where persisted history and tests live.
#[derive(Debug, Args)]
pub struct StorageConfig {
    /// Directory for persisted history and tests
    #[arg(long, env = "CARTWATCH_DATA_DIR", default_value = ".cartwatch")]
    pub data_dir: PathBuf,
}

/// The storefront to watch.
#[derive(Debug, Args)]
pub struct StorefrontConfig {
    /// Storefront base URL, e.g. https://shop.example
    #[arg(long, env = "CARTWATCH_STORE_URL")]
    pub store_url: String,

    /// Value of the storefront's `cart` cookie, to attach to an existing cart
    #[arg(long, env = "CARTWATCH_CART_TOKEN")]
    pub cart_token: Option<String>,
}

impl StorefrontConfig {
    /// Client for the configured storefront and cart.
    ///
    /// # Errors
    ///
    /// Returns an [`AdapterError`] if the URL is invalid or the client cannot be built.
    pub fn adapter(&self) -> Result<HttpCartAdapter, AdapterError> {
        HttpCartAdapter::new(self.store_url.as_str(), self.cart_token.as_deref())
    }
}

/// History and polling settings.
#[derive(Debug, Args)]
pub struct TrackingConfig {
    /// Maximum number of history entries kept
    #[arg(long, env = "CARTWATCH_HISTORY_LIMIT", default_value_t = DEFAULT_HISTORY_LIMIT)]
    pub history_limit: usize,

    /// Milliseconds between cart refreshes
    #[arg(long, env = "CARTWATCH_POLL_INTERVAL_MS", default_value_t = 3000u64)]
    pub poll_interval_ms: u64,
}

impl TrackingConfig {
    /// Tracker settings.
    pub fn tracker(&self) -> TrackerConfig {
        TrackerConfig {
            history_limit: self.history_limit,
        }
    }

    /// Refresh interval, at least one millisecond.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}
