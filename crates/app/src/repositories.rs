//! Repositories
//!
//! Typed access to the history log and the test collection on top of a
//! [`KeyValueStore`].

use std::sync::Arc;

use cartwatch::{history::HistoryEntry, rules::CartTest};

use crate::storage::{KeyValueStore, StoreError};

/// Storage key of the persisted history log.
pub const HISTORY_KEY: &str = "cartwatch.history";

/// Storage key of the persisted test collection.
pub const TESTS_KEY: &str = "cartwatch.tests";

/// Persists the history log.
#[derive(Clone)]
pub struct HistoryRepository {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for HistoryRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryRepository").finish_non_exhaustive()
    }
}

impl HistoryRepository {
    /// Create a repository over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Read the persisted entries, oldest first. A missing log is empty.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store fails or holds invalid JSON.
    pub async fn load(&self) -> Result<Vec<HistoryEntry>, StoreError> {
        match self.store.get(HISTORY_KEY).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    /// Replace the persisted entries.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store fails.
    pub async fn save(&self, entries: &[HistoryEntry]) -> Result<(), StoreError> {
        self.store
            .set(HISTORY_KEY, serde_json::to_string(entries)?)
            .await
    }

    /// Delete the persisted log.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store fails.
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(HISTORY_KEY).await
    }
}

/// Persists the test collection.
#[derive(Clone)]
pub struct TestsRepository {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for TestsRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestsRepository").finish_non_exhaustive()
    }
}

impl TestsRepository {
    /// Create a repository over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Read the persisted tests. A missing collection is empty.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store fails or holds invalid JSON.
    pub async fn load(&self) -> Result<Vec<CartTest>, StoreError> {
        match self.store.get(TESTS_KEY).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    /// Replace the persisted tests.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store fails.
    pub async fn save(&self, tests: &[CartTest]) -> Result<(), StoreError> {
        self.store.set(TESTS_KEY, serde_json::to_string(tests)?).await
    }
}
