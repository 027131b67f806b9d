//! Cart State Tracker
//!
//! Owns the authoritative snapshot and the history log. New snapshots are
//! diffed against the last one, recorded, persisted and published to
//! subscribers. A restore replays a past snapshot onto the live cart.
//!
//! State sits behind a short-lived [`Mutex`]; it is never held across an
//! adapter or storage call, and subscribers are notified after it is
//! released. Every check that decides whether a snapshot is recorded runs
//! under the same lock acquisition as the write.

use std::{
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

use cartwatch::{
    cart::CartSnapshot,
    diff::{CartDiff, snapshots_differ},
    history::{DEFAULT_HISTORY_LIMIT, History, HistoryEntry},
};
use jiff::Timestamp;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    adapter::{AdapterError, CartAdapter, CartMutation, MutationItem},
    repositories::HistoryRepository,
    storage::StoreError,
};

pub use cartwatch::diff::diff;

/// Label of the entry recorded when a restore completes.
pub const RESTORED_LABEL: &str = "restored";

/// Tracker settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Maximum number of history entries kept.
    pub history_limit: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// Whether a restore is in progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrackerState {
    /// Snapshots are recorded as they arrive.
    #[default]
    Idle,

    /// A restore is replaying a snapshot; incoming snapshots are ignored.
    Restoring,
}

/// Errors from [`CartStateTracker::refresh`] and the storage operations.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The cart could not be fetched.
    #[error("failed to fetch cart")]
    Fetch(#[source] AdapterError),

    /// The history store failed.
    #[error("history storage failed")]
    Storage(#[from] StoreError),
}

/// Step of the restore sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreStep {
    /// Reading the live cart before changing it.
    Inspect,

    /// Emptying the live cart.
    Clear,

    /// Adding the recorded lines.
    AddItems,

    /// Setting the note and attributes.
    UpdateCart,

    /// Fetching the resulting cart.
    Fetch,
}

impl fmt::Display for RestoreStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Inspect => "reading the live cart",
            Self::Clear => "clearing the cart",
            Self::AddItems => "adding line items",
            Self::UpdateCart => "updating note and attributes",
            Self::Fetch => "fetching the restored cart",
        })
    }
}

/// Errors from [`CartStateTracker::restore`].
#[derive(Debug, Error)]
pub enum RestoreError {
    /// Another restore is running.
    #[error("a restore is already in progress")]
    AlreadyRestoring,

    /// A step failed; earlier steps are not rolled back.
    #[error("restore failed while {step}")]
    Step {
        /// Step that failed.
        step: RestoreStep,
        /// Adapter failure.
        #[source]
        source: AdapterError,
    },
}

/// Failure reported by a subscriber.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SubscriberError(pub String);

type Callback = Arc<dyn Fn(&CartSnapshot, &CartDiff) -> Result<(), SubscriberError> + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    callbacks: Vec<(u64, Callback)>,
}

/// Handle to a registered subscriber.
///
/// Dropping the handle leaves the subscriber registered.
#[must_use = "call unsubscribe() to remove the subscriber"]
pub struct Subscription {
    id: u64,
    subscribers: Weak<Mutex<Subscribers>>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Subscription {
    /// Remove the subscriber. Later snapshots are not delivered to it.
    pub fn unsubscribe(self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            lock(&subscribers)
                .callbacks
                .retain(|(id, _)| *id != self.id);
        }
    }
}

struct Inner {
    snapshot: Option<CartSnapshot>,
    history: History,
    state: TrackerState,
    applied_sequence: u64,
}

/// Tracks a live cart, its history and its subscribers.
pub struct CartStateTracker {
    adapter: Arc<dyn CartAdapter>,
    repository: HistoryRepository,
    saving: tokio::sync::Mutex<()>,
    inner: Mutex<Inner>,
    subscribers: Arc<Mutex<Subscribers>>,
    sequence: AtomicU64,
}

impl fmt::Debug for CartStateTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = lock(&self.inner);

        f.debug_struct("CartStateTracker")
            .field("state", &inner.state)
            .field("history", &inner.history.len())
            .finish_non_exhaustive()
    }
}

impl CartStateTracker {
    /// Create a tracker with no snapshot and an empty history.
    #[must_use]
    pub fn new(
        adapter: Arc<dyn CartAdapter>,
        repository: HistoryRepository,
        config: TrackerConfig,
    ) -> Self {
        Self {
            adapter,
            repository,
            saving: tokio::sync::Mutex::new(()),
            inner: Mutex::new(Inner {
                snapshot: None,
                history: History::new(config.history_limit),
                state: TrackerState::Idle,
                applied_sequence: 0,
            }),
            subscribers: Arc::new(Mutex::new(Subscribers::default())),
            sequence: AtomicU64::new(0),
        }
    }

    /// Reload persisted history; the latest entry becomes the current
    /// snapshot. Returns the number of entries kept.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Storage`] if the history cannot be read.
    pub async fn load_history(&self) -> Result<usize, TrackerError> {
        let entries = self.repository.load().await?;

        let mut inner = lock(&self.inner);
        let limit = inner.history.limit();

        let history = History::with_entries(entries, limit);

        inner.snapshot = history.latest().map(|entry| entry.snapshot.clone());
        inner.history = history;

        info!(entries = inner.history.len(), "loaded cart history");

        Ok(inner.history.len())
    }

    /// Current snapshot, if one has been seen.
    pub fn snapshot(&self) -> Option<CartSnapshot> {
        lock(&self.inner).snapshot.clone()
    }

    /// History entries, oldest first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        lock(&self.inner).history.to_vec()
    }

    /// Whether a restore is in progress.
    pub fn state(&self) -> TrackerState {
        lock(&self.inner).state
    }

    /// Accept a new snapshot.
    ///
    /// Records and publishes it when it differs structurally from the
    /// current one; the first snapshot is diffed against an empty cart.
    /// Returns the recorded diff, or `None` for a no-op or while restoring.
    pub async fn set_snapshot(&self, snapshot: CartSnapshot) -> Option<CartDiff> {
        let sequence = self.next_sequence();

        self.apply(sequence, snapshot).await
    }

    /// Fetch the live cart and feed it to [`set_snapshot`](Self::set_snapshot).
    ///
    /// A response that arrives after a newer one has been applied is
    /// discarded.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Fetch`] when the adapter fails; state and
    /// history are unchanged.
    pub async fn refresh(&self) -> Result<Option<CartDiff>, TrackerError> {
        let sequence = self.next_sequence();

        let snapshot = self
            .adapter
            .fetch_cart()
            .await
            .map_err(TrackerError::Fetch)?;

        Ok(self.apply(sequence, snapshot).await)
    }

    /// Register `callback` for every published snapshot.
    ///
    /// Callbacks run in subscription order. A callback that errors or panics
    /// is logged and does not stop the others.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&CartSnapshot, &CartDiff) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        let mut subscribers = lock(&self.subscribers);

        subscribers.next_id += 1;

        let id = subscribers.next_id;

        subscribers.callbacks.push((id, Arc::new(callback)));

        Subscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    /// Replay `entry`'s snapshot onto the live cart.
    ///
    /// Reads the live cart, clears it, adds every recorded line, sets the
    /// note and attributes, then re-fetches. Live attributes the entry lacks
    /// are blanked so they do not survive. Snapshots arriving meanwhile are
    /// ignored.
    /// The fetched cart is recorded as one entry labelled
    /// [`RESTORED_LABEL`] and published.
    ///
    /// # Errors
    ///
    /// Returns [`RestoreError::AlreadyRestoring`] when another restore is
    /// running, or [`RestoreError::Step`] naming the step that failed. A
    /// failed restore leaves the cart partially applied and the tracker
    /// [`TrackerState::Idle`].
    pub async fn restore(&self, entry: &HistoryEntry) -> Result<CartSnapshot, RestoreError> {
        let guard = RestoreGuard::enter(&self.inner)?;
        let target = &entry.snapshot;

        info!(
            recorded_at = %entry.timestamp,
            items = target.items.len(),
            "restoring cart"
        );

        let live = self
            .adapter
            .fetch_cart()
            .await
            .map_err(|source| RestoreError::Step {
                step: RestoreStep::Inspect,
                source,
            })?;

        self.adapter
            .clear_cart()
            .await
            .map_err(|source| RestoreError::Step {
                step: RestoreStep::Clear,
                source,
            })?;

        if !target.items.is_empty() {
            self.adapter
                .mutate(CartMutation::add(target.items.iter().map(MutationItem::from)))
                .await
                .map_err(|source| RestoreError::Step {
                    step: RestoreStep::AddItems,
                    source,
                })?;
        }

        let mut attributes = target.attributes.clone();

        for key in live.attributes.into_keys() {
            attributes.entry(key).or_default();
        }

        self.adapter
            .mutate(CartMutation::update(
                target.note.clone().unwrap_or_default(),
                attributes,
            ))
            .await
            .map_err(|source| RestoreError::Step {
                step: RestoreStep::UpdateCart,
                source,
            })?;

        let restored = self
            .adapter
            .fetch_cart()
            .await
            .map_err(|source| RestoreError::Step {
                step: RestoreStep::Fetch,
                source,
            })?;

        let sequence = self.next_sequence();
        let entry = commit(
            &mut lock(&self.inner),
            sequence,
            restored.clone(),
            Some(RESTORED_LABEL),
        );

        drop(guard);

        self.publish(entry).await;

        info!(items = restored.items.len(), "restored cart");

        Ok(restored)
    }

    /// Empty the history log and its persisted copy.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Storage`] if the persisted copy cannot be removed.
    pub async fn clear_history(&self) -> Result<(), TrackerError> {
        let _saving = self.saving.lock().await;

        lock(&self.inner).history.clear();

        self.repository.clear().await?;

        info!("cleared cart history");

        Ok(())
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn apply(&self, sequence: u64, snapshot: CartSnapshot) -> Option<CartDiff> {
        let entry = {
            let mut inner = lock(&self.inner);

            if inner.state == TrackerState::Restoring {
                debug!("ignoring snapshot during restore");
                return None;
            }

            if sequence < inner.applied_sequence {
                warn!(
                    sequence,
                    applied = inner.applied_sequence,
                    "discarding stale cart response"
                );
                return None;
            }

            if let Some(current) = &inner.snapshot
                && !snapshots_differ(current, &snapshot)
            {
                debug!("cart unchanged");
                return None;
            }

            commit(&mut inner, sequence, snapshot, None)
        };

        Some(self.publish(entry).await)
    }

    async fn publish(&self, entry: HistoryEntry) -> CartDiff {
        info!(
            label = %entry.label,
            items = entry.snapshot.items.len(),
            total_price = entry.snapshot.total_price,
            "recorded cart change"
        );

        self.persist().await;

        self.notify(&entry.snapshot, &entry.diff);

        entry.diff
    }

    /// Save the history as it is when the save lock is acquired, so the
    /// last save always writes the latest list.
    async fn persist(&self) {
        let _saving = self.saving.lock().await;
        let entries = self.history();

        if let Err(error) = self.repository.save(&entries).await {
            warn!(%error, "failed to persist cart history");
        }
    }

    fn notify(&self, snapshot: &CartSnapshot, diff: &CartDiff) {
        let callbacks: Vec<(u64, Callback)> = lock(&self.subscribers).callbacks.clone();

        for (id, callback) in callbacks {
            match catch_unwind(AssertUnwindSafe(|| callback(snapshot, diff))) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => warn!(subscriber = id, %error, "subscriber failed"),
                Err(_panic) => warn!(subscriber = id, "subscriber panicked"),
            }
        }
    }
}

/// Record `snapshot` as the current one and append its history entry.
fn commit(
    inner: &mut Inner,
    sequence: u64,
    snapshot: CartSnapshot,
    label: Option<&str>,
) -> HistoryEntry {
    let previous = inner.snapshot.take().unwrap_or_default();
    let mut entry = HistoryEntry::record(&previous, snapshot.clone(), Timestamp::now());

    if let Some(label) = label {
        entry = entry.with_label(label);
    }

    inner.snapshot = Some(snapshot);
    inner.applied_sequence = inner.applied_sequence.max(sequence);

    if let Some(evicted) = inner.history.push(entry.clone()) {
        debug!(recorded_at = %evicted.timestamp, "evicted oldest history entry");
    }

    entry
}

/// Holds [`TrackerState::Restoring`] until dropped.
struct RestoreGuard<'a> {
    inner: &'a Mutex<Inner>,
}

impl<'a> RestoreGuard<'a> {
    fn enter(inner: &'a Mutex<Inner>) -> Result<Self, RestoreError> {
        let mut state = lock(inner);

        if state.state == TrackerState::Restoring {
            return Err(RestoreError::AlreadyRestoring);
        }

        state.state = TrackerState::Restoring;

        Ok(Self { inner })
    }
}

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        lock(self.inner).state = TrackerState::Idle;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
