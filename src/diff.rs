//! Cart Diffs
//!
//! Structural deltas between two snapshots, matched on line item key.

use std::fmt::{Display, Formatter, Result as FmtResult};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::cart::{CartSnapshot, LineItem};

/// A line present in both snapshots whose quantity changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifiedItem {
    /// The line as it appears in the current snapshot.
    pub item: LineItem,

    /// Quantity in the previous snapshot.
    pub old_quantity: i64,

    /// Quantity in the current snapshot.
    pub new_quantity: i64,
}

/// Delta between a previous and a current snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartDiff {
    /// Lines only in the current snapshot, in current order.
    pub added: Vec<LineItem>,

    /// Lines only in the previous snapshot, in previous order.
    pub removed: Vec<LineItem>,

    /// Lines in both with differing quantities, in current order.
    pub modified: Vec<ModifiedItem>,

    /// Whether the cart note changed.
    pub note_changed: bool,

    /// Whether the cart attributes changed.
    pub attributes_changed: bool,

    /// Whether the applied discount codes changed.
    pub discount_changed: bool,
}

impl CartDiff {
    /// No lines moved and no cart-level field changed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.modified.is_empty()
            && !self.note_changed
            && !self.attributes_changed
            && !self.discount_changed
    }

    /// Short human-readable label, e.g. `+1 added, 2 modified`.
    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl Display for CartDiff {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let mut parts = Vec::new();

        if !self.added.is_empty() {
            parts.push(format!("+{} added", self.added.len()));
        }

        if !self.removed.is_empty() {
            parts.push(format!("-{} removed", self.removed.len()));
        }

        if !self.modified.is_empty() {
            parts.push(format!("{} modified", self.modified.len()));
        }

        if self.note_changed {
            parts.push("note changed".to_string());
        }

        if self.attributes_changed {
            parts.push("attributes changed".to_string());
        }

        if self.discount_changed {
            parts.push("discounts changed".to_string());
        }

        if parts.is_empty() {
            f.write_str("no changes")
        } else {
            f.write_str(&parts.join(", "))
        }
    }
}

/// Compute the delta from `previous` to `current`.
///
/// Pure and deterministic for identical inputs.
pub fn diff(previous: &CartSnapshot, current: &CartSnapshot) -> CartDiff {
    let previous_by_key: FxHashMap<&str, &LineItem> = previous
        .items
        .iter()
        .map(|item| (item.key.as_str(), item))
        .collect();

    let current_by_key: FxHashMap<&str, &LineItem> = current
        .items
        .iter()
        .map(|item| (item.key.as_str(), item))
        .collect();

    let mut added = Vec::new();
    let mut modified = Vec::new();

    for item in &current.items {
        match previous_by_key.get(item.key.as_str()) {
            None => added.push(item.clone()),
            Some(old) if old.quantity != item.quantity => modified.push(ModifiedItem {
                item: item.clone(),
                old_quantity: old.quantity,
                new_quantity: item.quantity,
            }),
            Some(_) => {}
        }
    }

    let removed = previous
        .items
        .iter()
        .filter(|item| !current_by_key.contains_key(item.key.as_str()))
        .cloned()
        .collect();

    CartDiff {
        added,
        removed,
        modified,
        note_changed: previous.note != current.note,
        attributes_changed: previous.attributes != current.attributes,
        discount_changed: previous.discount_codes != current.discount_codes,
    }
}

/// Structural change test used to decide whether a new snapshot is recorded:
/// item count, total price, or the serialized line items differ.
pub fn snapshots_differ(a: &CartSnapshot, b: &CartSnapshot) -> bool {
    if a.item_count != b.item_count || a.total_price != b.total_price {
        return true;
    }

    match (serde_json::to_value(&a.items), serde_json::to_value(&b.items)) {
        (Ok(left), Ok(right)) => left != right,
        _ => false,
    }
}
