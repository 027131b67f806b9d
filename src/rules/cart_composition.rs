//! Cart Composition Rules
//!
//! When the cart holds a trigger line it must also hold some companion line.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::{SmallVec, smallvec};

use crate::{
    cart::{CartSnapshot, LineItem, lenient},
    rules::{Violation, de},
};

/// Exact match of a dotted item field against a value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemMatch {
    /// Dotted field path.
    #[serde(default, deserialize_with = "de::string")]
    pub field: String,

    /// Expected value, compared as a string.
    #[serde(default)]
    pub value: Value,
}

impl ItemMatch {
    /// Create a field match.
    pub fn new(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            value,
        }
    }

    /// Whether the path names a field at all.
    pub fn is_well_formed(&self) -> bool {
        !self.field.trim().is_empty()
    }

    /// Exact string equality between the item's field and the expected value.
    pub fn matches(&self, item: &LineItem) -> bool {
        if !self.is_well_formed() {
            return false;
        }

        item.field(&self.field)
            .is_some_and(|actual| lenient::display(&actual) == lenient::display(&self.value))
    }
}

/// Configuration of a cart composition rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartCompositionConfig {
    /// Trigger line.
    #[serde(default)]
    pub if_item: ItemMatch,

    /// Line that must accompany the trigger.
    #[serde(default)]
    pub requires_item: ItemMatch,
}

impl CartCompositionConfig {
    /// At most one violation, referencing the first trigger line.
    pub fn evaluate(&self, snapshot: &CartSnapshot) -> SmallVec<[Violation; 2]> {
        if !self.requires_item.is_well_formed() {
            return SmallVec::new();
        }

        let Some(trigger) = snapshot.items.iter().find(|item| self.if_item.matches(item)) else {
            return SmallVec::new();
        };

        if snapshot.items.iter().any(|item| self.requires_item.matches(item)) {
            return SmallVec::new();
        }

        smallvec![Violation::item(
            trigger,
            format!(
                "Cart requires an item where {} = {}",
                self.requires_item.field,
                lenient::display(&self.requires_item.value)
            ),
        )]
    }
}
