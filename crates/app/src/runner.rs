//! Test Runner
//!
//! Keeps the persisted test collection, re-runs it whenever the tracker
//! publishes a snapshot (while auto-run is on) and hands results to a
//! [`ResultSink`].

use std::{
    fmt,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use cartwatch::{
    cart::CartSnapshot,
    engine::{RuleEngine, TestResult},
    rules::{CartTest, TestUuid},
    transfer::{self, TransferError},
};
use mockall::automock;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    repositories::TestsRepository,
    storage::StoreError,
    tracker::{CartStateTracker, Subscription},
};

/// Runner error variants.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The test collection could not be read or written.
    #[error("test storage failed")]
    Storage(#[from] StoreError),

    /// A backup could not be read or written.
    #[error("test backup failed")]
    Transfer(#[from] TransferError),

    /// No test has the given id.
    #[error("test {0} not found")]
    UnknownTest(TestUuid),
}

/// Receives every batch of results.
#[automock]
pub trait ResultSink: Send + Sync {
    /// Called after each run with the results of every enabled test.
    fn publish(&self, results: &[TestResult]);
}

/// A [`ResultSink`] that logs each result.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ResultSink for LogSink {
    fn publish(&self, results: &[TestResult]) {
        for result in results {
            if result.passed {
                info!(test = %result.test_name, "test passed");
                continue;
            }

            for failure in &result.failures {
                warn!(
                    test = %result.test_name,
                    rule = %failure.rule_name,
                    item = failure.item_title.as_deref().unwrap_or("cart"),
                    "{}",
                    failure.message
                );
            }
        }
    }
}

/// Drives the rule engine from tracker snapshots.
pub struct TestRunner {
    engine: Mutex<RuleEngine>,
    repository: TestsRepository,
    sink: Arc<dyn ResultSink>,
    auto_run: AtomicBool,
    last_results: Mutex<Vec<TestResult>>,
}

impl fmt::Debug for TestRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestRunner")
            .field("tests", &lock(&self.engine).tests().len())
            .field("auto_run", &self.auto_run())
            .finish_non_exhaustive()
    }
}

impl TestRunner {
    /// Load the persisted tests. Auto-run starts enabled.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Storage`] if the tests cannot be read.
    pub async fn load(
        repository: TestsRepository,
        sink: Arc<dyn ResultSink>,
    ) -> Result<Self, RunnerError> {
        let tests = repository.load().await?;

        info!(tests = tests.len(), "loaded cart tests");

        Ok(Self {
            engine: Mutex::new(RuleEngine::new(tests)),
            repository,
            sink,
            auto_run: AtomicBool::new(true),
            last_results: Mutex::new(Vec::new()),
        })
    }

    /// Run every enabled test whenever `tracker` publishes, while auto-run is on.
    pub fn attach(self: &Arc<Self>, tracker: &CartStateTracker) -> Subscription {
        let runner = Arc::downgrade(self);

        tracker.subscribe(move |snapshot, _diff| {
            if let Some(runner) = runner.upgrade()
                && runner.auto_run()
            {
                runner.run_all(snapshot);
            }

            Ok(())
        })
    }

    /// Whether published snapshots trigger a run.
    pub fn auto_run(&self) -> bool {
        self.auto_run.load(Ordering::Relaxed)
    }

    /// Turn auto-run on or off.
    pub fn set_auto_run(&self, enabled: bool) {
        self.auto_run.store(enabled, Ordering::Relaxed);
    }

    /// Run every enabled test against `snapshot` and publish the results.
    pub fn run_all(&self, snapshot: &CartSnapshot) -> Vec<TestResult> {
        let results = lock(&self.engine).run_all_tests(snapshot);

        lock(&self.last_results).clone_from(&results);

        self.sink.publish(&results);

        results
    }

    /// Results of the most recent run.
    pub fn last_results(&self) -> Vec<TestResult> {
        lock(&self.last_results).clone()
    }

    /// Tests in their configured order.
    pub fn tests(&self) -> Vec<CartTest> {
        lock(&self.engine).tests().to_vec()
    }

    /// Append a test and persist the collection.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Storage`] if the collection cannot be saved.
    pub async fn add_test(&self, test: CartTest) -> Result<(), RunnerError> {
        lock(&self.engine).add(test);

        self.persist().await
    }

    /// Replace the test with the same id and persist the collection.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::UnknownTest`] when no test has that id.
    pub async fn update_test(&self, test: CartTest) -> Result<(), RunnerError> {
        let id = test.id;

        if !lock(&self.engine).replace(test) {
            return Err(RunnerError::UnknownTest(id));
        }

        self.persist().await
    }

    /// Delete a test and persist the collection.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::UnknownTest`] when no test has that id.
    pub async fn remove_test(&self, id: TestUuid) -> Result<CartTest, RunnerError> {
        let removed = lock(&self.engine)
            .remove(id)
            .ok_or(RunnerError::UnknownTest(id))?;

        self.persist().await?;

        Ok(removed)
    }

    /// Enable or disable a test and persist the collection.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::UnknownTest`] when no test has that id.
    pub async fn set_enabled(&self, id: TestUuid, enabled: bool) -> Result<(), RunnerError> {
        if !lock(&self.engine).set_enabled(id, enabled) {
            return Err(RunnerError::UnknownTest(id));
        }

        self.persist().await
    }

    /// Append the tests in a JSON backup, with fresh ids. Returns how many
    /// were imported.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Transfer`] for an invalid backup.
    pub async fn import_json(&self, json: &str) -> Result<usize, RunnerError> {
        let imported = transfer::import_tests_json(json)?;
        let count = imported.len();

        {
            let mut engine = lock(&self.engine);

            for test in imported {
                engine.add(test);
            }
        }

        self.persist().await?;

        info!(count, "imported cart tests");

        Ok(count)
    }

    /// Serialize the collection as a JSON backup.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Transfer`] if serialization fails.
    pub fn export_json(&self) -> Result<String, RunnerError> {
        Ok(transfer::export_tests_json(lock(&self.engine).tests())?)
    }

    async fn persist(&self) -> Result<(), RunnerError> {
        let tests = self.tests();

        self.repository.save(&tests).await?;

        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
