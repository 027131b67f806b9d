//! Cart Adapter
//!
//! The seam between the tracker and a live storefront cart. The tracker only
//! ever fetches, clears and mutates through this trait.

use std::collections::BTreeMap;

use async_trait::async_trait;
use cartwatch::cart::{CartSnapshot, LineItem, SnapshotError};
use mockall::automock;
use serde::Serialize;
use thiserror::Error;

mod http;

pub use http::HttpCartAdapter;

/// Errors surfaced by a cart adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The request could not be sent or its body not read.
    #[error("cart request failed")]
    Http(#[from] reqwest::Error),

    /// The storefront answered with an unexpected status.
    #[error("cart request failed with status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, verbatim.
        body: String,
    },

    /// The storefront refused the change and said why.
    #[error("storefront rejected the request: {0}")]
    Rejected(String),

    /// The cart payload was not a cart.
    #[error("invalid cart payload")]
    Decode(#[source] SnapshotError),

    /// The storefront URL could not be parsed.
    #[error("invalid storefront url {url:?}: {reason}")]
    InvalidUrl {
        /// URL as configured.
        url: String,
        /// Parser message.
        reason: String,
    },
}

/// One line to add to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationItem {
    /// Variant id.
    pub id: i64,

    /// Quantity to add.
    pub quantity: i64,

    /// Line item properties.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,

    /// Selling plan to subscribe the line to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selling_plan: Option<String>,
}

impl From<&LineItem> for MutationItem {
    fn from(item: &LineItem) -> Self {
        Self {
            id: item.variant_id,
            quantity: item.quantity,
            properties: item.properties.clone(),
            selling_plan: item.selling_plan_id.clone(),
        }
    }
}

/// A change to apply to the cart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartMutation {
    /// Lines to add.
    pub items: Vec<MutationItem>,

    /// New cart note, if it should change.
    pub note: Option<String>,

    /// Cart attributes to set.
    pub attributes: BTreeMap<String, String>,
}

impl CartMutation {
    /// Add the given lines.
    pub fn add(items: impl IntoIterator<Item = MutationItem>) -> Self {
        Self {
            items: items.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Set the note and attributes.
    pub fn update(note: impl Into<String>, attributes: BTreeMap<String, String>) -> Self {
        Self {
            note: Some(note.into()),
            attributes,
            ..Self::default()
        }
    }

    /// Whether the note or attributes change.
    pub fn updates_cart(&self) -> bool {
        self.note.is_some() || !self.attributes.is_empty()
    }
}

/// Access to a live cart.
#[automock]
#[async_trait]
pub trait CartAdapter: Send + Sync {
    /// Fetch the current cart.
    async fn fetch_cart(&self) -> Result<CartSnapshot, AdapterError>;

    /// Remove every line from the cart.
    async fn clear_cart(&self) -> Result<(), AdapterError>;

    /// Add lines and/or update the note and attributes.
    async fn mutate(&self, mutation: CartMutation) -> Result<(), AdapterError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutation_item_copies_line() {
        let line = LineItem::new("k", 42, 3)
            .with_property("_gift", "yes")
            .with_selling_plan("991");

        let item = MutationItem::from(&line);

        assert_eq!(item.id, 42);
        assert_eq!(item.quantity, 3);
        assert_eq!(item.properties.get("_gift").map(String::as_str), Some("yes"));
        assert_eq!(item.selling_plan.as_deref(), Some("991"));
    }

    #[test]
    fn mutation_item_omits_empty_optionals() -> testresult::TestResult {
        let item = MutationItem::from(&LineItem::new("k", 7, 1));

        assert_eq!(
            serde_json::to_value(&item)?,
            serde_json::json!({ "id": 7, "quantity": 1 })
        );

        Ok(())
    }

    #[test]
    fn add_does_not_update_cart() {
        assert!(!CartMutation::add([]).updates_cart());
        assert!(CartMutation::update("", BTreeMap::new()).updates_cart());
    }
}
