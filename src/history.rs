//! Cart History
//!
//! A bounded, append-only log of recorded cart transitions. Each entry keeps
//! the full snapshot it produced so that it can be replayed later.

use std::collections::VecDeque;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::{
    cart::CartSnapshot,
    diff::{CartDiff, diff},
};

/// Default number of entries kept.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// One recorded transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// When the transition was recorded.
    pub timestamp: Timestamp,

    /// Short description of the change.
    pub label: String,

    /// Delta relative to the prior recorded snapshot.
    pub diff: CartDiff,

    /// The full snapshot after the transition.
    pub snapshot: CartSnapshot,
}

impl HistoryEntry {
    /// Record the transition from `previous` to `snapshot`, labelled with the diff summary.
    pub fn record(previous: &CartSnapshot, snapshot: CartSnapshot, timestamp: Timestamp) -> Self {
        let diff = diff(previous, &snapshot);

        Self {
            timestamp,
            label: diff.summary(),
            diff,
            snapshot,
        }
    }

    /// Replace the label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// Bounded FIFO history log. The oldest entry is evicted first.
#[derive(Debug, Clone, PartialEq)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    limit: usize,
}

impl History {
    /// Create an empty history bounded to `limit` entries (at least one).
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);

        Self {
            entries: VecDeque::with_capacity(limit),
            limit,
        }
    }

    /// Create a history from existing entries, keeping only the newest `limit`.
    pub fn with_entries(entries: impl IntoIterator<Item = HistoryEntry>, limit: usize) -> Self {
        let mut history = Self::new(limit);

        entries.into_iter().for_each(|entry| {
            history.push(entry);
        });

        history
    }

    /// Append an entry, returning the evicted oldest entry if the bound was exceeded.
    pub fn push(&mut self, entry: HistoryEntry) -> Option<HistoryEntry> {
        self.entries.push_back(entry);

        if self.entries.len() > self.limit {
            self.entries.pop_front()
        } else {
            None
        }
    }

    /// Entries from oldest to newest.
    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &HistoryEntry> + ExactSizeIterator {
        self.entries.iter()
    }

    /// Entry by position, oldest first.
    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    /// Most recently recorded entry.
    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Get the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the history is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The configured bound.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Copy the entries out, oldest first.
    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}
