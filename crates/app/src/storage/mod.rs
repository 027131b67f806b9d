//! Key-Value Storage
//!
//! History lives in a session-scoped store and test definitions in a durable
//! one. Both are string-keyed JSON blobs behind [`KeyValueStore`].

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Storage error variants.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing medium failed.
    #[error("storage IO failed")]
    Io(#[from] std::io::Error),

    /// A stored value was not valid JSON for its key.
    #[error("stored value is not valid JSON")]
    Json(#[from] serde_json::Error),

    /// The key cannot be mapped to the backing medium.
    #[error("invalid storage key {0:?}")]
    InvalidKey(String),
}

/// A string-keyed store of serialized values.
#[automock]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write `value` under `key`, replacing what was there.
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Delete `key`. Deleting a missing key succeeds.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}
