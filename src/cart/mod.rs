//! Cart Snapshots
//!
//! Typed, immutable views of a storefront cart at one instant. Snapshots are
//! validated at the boundary: any JSON object is accepted and fields that are
//! missing or unusable take their empty values, so a malformed cart never
//! reaches the diffing or rule code as an error.

use std::collections::BTreeMap;

use rusty_money::{Money, iso};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

mod items;
pub(crate) mod lenient;

pub use items::LineItem;

/// Errors raised while reading a snapshot from raw JSON.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The payload was not valid JSON.
    #[error("cart payload is not valid JSON")]
    Json(#[source] serde_json::Error),

    /// The payload was JSON, but not an object.
    #[error("cart payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// A discount code applied to the cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawDiscountCode")]
pub struct DiscountCode {
    /// The code as entered.
    pub code: String,

    /// Discount amount in minor units.
    pub amount: i64,
}

/// The cart at one instant.
///
/// Never mutated in place: every change produces a new snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawCartSnapshot")]
pub struct CartSnapshot {
    /// Line items in cart order.
    pub items: Vec<LineItem>,

    /// Cart note.
    pub note: Option<String>,

    /// Cart attributes.
    pub attributes: BTreeMap<String, String>,

    /// Cart total in minor units.
    pub total_price: i64,

    /// Number of units in the cart.
    pub item_count: i64,

    /// ISO 4217 currency code.
    pub currency: String,

    /// Applied discount codes.
    pub discount_codes: Vec<DiscountCode>,
}

impl CartSnapshot {
    /// Build a consistent snapshot from line items: `item_count` and
    /// `total_price` are derived from the lines.
    pub fn with_items(items: impl Into<Vec<LineItem>>, currency: impl Into<String>) -> Self {
        let items = items.into();

        Self {
            item_count: saturating_sum(items.iter().map(|item| item.quantity)),
            total_price: saturating_sum(items.iter().map(|item| item.line_price)),
            items,
            currency: currency.into(),
            ..Self::default()
        }
    }

    /// Parse a snapshot from storefront cart JSON.
    ///
    /// # Errors
    ///
    /// Returns a [`SnapshotError`] if the payload is not a JSON object.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let value: Value = serde_json::from_str(json).map_err(SnapshotError::Json)?;

        Self::from_value(value)
    }

    /// Convert an already-parsed JSON value into a snapshot.
    ///
    /// # Errors
    ///
    /// Returns a [`SnapshotError`] if the value is not a JSON object.
    pub fn from_value(value: Value) -> Result<Self, SnapshotError> {
        let kind = match &value {
            Value::Object(_) => None,
            Value::Null => Some("null"),
            Value::Bool(_) => Some("a boolean"),
            Value::Number(_) => Some("a number"),
            Value::String(_) => Some("a string"),
            Value::Array(_) => Some("an array"),
        };

        if let Some(kind) = kind {
            return Err(SnapshotError::NotAnObject(kind));
        }

        serde_json::from_value(value).map_err(SnapshotError::Json)
    }

    /// Set the cart note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Set a cart attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Add a discount code.
    #[must_use]
    pub fn with_discount_code(mut self, code: impl Into<String>, amount: i64) -> Self {
        self.discount_codes.push(DiscountCode {
            code: code.into(),
            amount,
        });
        self
    }

    /// Check if the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of line quantities.
    pub fn quantity_total(&self) -> i64 {
        saturating_sum(self.items.iter().map(|item| item.quantity))
    }

    /// Whether `item_count` agrees with the line quantities.
    pub fn is_consistent(&self) -> bool {
        self.item_count == self.quantity_total()
    }

    /// Find a line by key.
    pub fn item(&self, key: &str) -> Option<&LineItem> {
        self.items.iter().find(|item| item.key == key)
    }

    /// The cart total as money, when the currency code is known.
    pub fn total(&self) -> Option<Money<'static, iso::Currency>> {
        iso::find(&self.currency).map(|currency| Money::from_minor(self.total_price, currency))
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawCartSnapshot {
    #[serde(default)]
    items: Option<Value>,
    #[serde(default)]
    note: Option<Value>,
    #[serde(default)]
    attributes: Option<Value>,
    #[serde(default)]
    total_price: Option<Value>,
    #[serde(default)]
    item_count: Option<Value>,
    #[serde(default)]
    currency: Option<Value>,
    #[serde(default)]
    discount_codes: Option<Value>,
}

impl From<RawCartSnapshot> for CartSnapshot {
    fn from(raw: RawCartSnapshot) -> Self {
        Self {
            items: objects(raw.items),
            note: lenient::string(raw.note.as_ref()),
            attributes: lenient::string_map(raw.attributes.as_ref()),
            total_price: lenient::int(raw.total_price.as_ref()),
            item_count: lenient::int(raw.item_count.as_ref()),
            currency: lenient::string(raw.currency.as_ref()).unwrap_or_default(),
            discount_codes: objects(raw.discount_codes),
        }
    }
}

/// Deserialize every object in a JSON array, skipping anything else.
fn objects<T: for<'de> Deserialize<'de>>(value: Option<Value>) -> Vec<T> {
    let Some(Value::Array(values)) = value else {
        return Vec::new();
    };

    values
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect()
}

#[derive(Debug, Default, Deserialize)]
struct RawDiscountCode {
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    amount: Option<Value>,
}

impl From<RawDiscountCode> for DiscountCode {
    fn from(raw: RawDiscountCode) -> Self {
        Self {
            code: lenient::string(raw.code.as_ref()).unwrap_or_default(),
            amount: lenient::int(raw.amount.as_ref()),
        }
    }
}

/// Sum that clamps at the `i64` bounds instead of overflowing.
pub(crate) fn saturating_sum(values: impl IntoIterator<Item = i64>) -> i64 {
    values.into_iter().fold(0, i64::saturating_add)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use testresult::TestResult;

    use super::*;

    #[test]
    fn parses_storefront_cart() -> TestResult {
        let cart = CartSnapshot::from_json(
            r#"{
                "token": "abc",
                "note": "Leave at door",
                "attributes": { "gift_wrap": "yes" },
                "total_price": 4500,
                "item_count": 3,
                "currency": "GBP",
                "items": [
                    { "key": "1:a", "id": 1, "quantity": 1, "line_price": 1500, "title": "Mug" },
                    { "key": "2:b", "id": 2, "quantity": 2, "line_price": 3000, "title": "Tea" }
                ],
                "discount_codes": [{ "code": "WELCOME", "amount": 500 }]
            }"#,
        )?;

        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.note.as_deref(), Some("Leave at door"));
        assert_eq!(cart.attributes.get("gift_wrap").map(String::as_str), Some("yes"));
        assert_eq!(cart.total_price, 4500);
        assert_eq!(cart.item_count, 3);
        assert!(cart.is_consistent());
        assert_eq!(cart.discount_codes.len(), 1);
        assert_eq!(cart.total(), Some(Money::from_minor(4500, iso::GBP)));

        Ok(())
    }

    #[test]
    fn malformed_fields_degrade_to_empty() -> TestResult {
        let cart = CartSnapshot::from_value(json!({
            "items": [42, "nope", { "key": "k", "quantity": "2" }],
            "attributes": "not a map",
            "total_price": null,
            "discount_codes": null
        }))?;

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.quantity_total(), 2);
        assert!(cart.attributes.is_empty());
        assert_eq!(cart.total_price, 0);
        assert!(cart.discount_codes.is_empty());
        assert!(!cart.is_consistent());
        assert_eq!(cart.total(), None);

        Ok(())
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let result = CartSnapshot::from_json("[1, 2, 3]");

        assert!(
            matches!(result, Err(SnapshotError::NotAnObject("an array"))),
            "expected NotAnObject, got {result:?}"
        );

        let result = CartSnapshot::from_json("{ nope");

        assert!(
            matches!(result, Err(SnapshotError::Json(_))),
            "expected Json error, got {result:?}"
        );
    }

    #[test]
    fn with_items_derives_totals() {
        let cart = CartSnapshot::with_items(
            [
                LineItem::new("a", 1, 2).with_line_price(400),
                LineItem::new("b", 2, 3).with_line_price(900),
            ],
            "USD",
        );

        assert_eq!(cart.item_count, 5);
        assert_eq!(cart.total_price, 1300);
        assert!(cart.is_consistent());
        assert_eq!(cart.item("b").map(|item| item.quantity), Some(3));
    }
}
