//! Cart Line Items

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cart::lenient;

/// Dotted path to a subscription selling plan id on storefront line items.
const SELLING_PLAN_PATH: &str = "selling_plan_allocation.selling_plan.id";

/// One line in a cart.
///
/// `key` is the identity used to match lines across snapshots. Fields the
/// storefront sends that are not modelled explicitly are kept in `extra` so
/// that [`LineItem::field`] can reach them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawLineItem")]
pub struct LineItem {
    /// Stable line key, unique within a snapshot.
    pub key: String,

    /// Variant id.
    pub variant_id: i64,

    /// Product id.
    pub product_id: i64,

    /// Quantity of this line.
    pub quantity: i64,

    /// Line item properties.
    pub properties: BTreeMap<String, String>,

    /// Subscription selling plan, when the line is sold on one.
    pub selling_plan_id: Option<String>,

    /// Line price in minor units.
    pub line_price: i64,

    /// Line price before discounts, in minor units.
    pub original_line_price: i64,

    /// Product title.
    pub title: String,

    /// Variant title.
    pub variant_title: String,

    /// Every other field the storefront sent for this line.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LineItem {
    /// Create a line with the given key, variant and quantity.
    pub fn new(key: impl Into<String>, variant_id: i64, quantity: i64) -> Self {
        Self {
            key: key.into(),
            variant_id,
            quantity,
            ..Self::default()
        }
    }

    /// Set the product title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the line price (and original line price) in minor units.
    #[must_use]
    pub fn with_line_price(mut self, line_price: i64) -> Self {
        self.line_price = line_price;
        self.original_line_price = line_price;
        self
    }

    /// Add a line item property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Set the selling plan.
    #[must_use]
    pub fn with_selling_plan(mut self, selling_plan_id: impl Into<String>) -> Self {
        self.selling_plan_id = Some(selling_plan_id.into());
        self
    }

    /// Set an arbitrary storefront field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    /// Look up a field by dotted path, e.g. `selling_plan_allocation.selling_plan.id`.
    ///
    /// Numeric path segments index into arrays. Missing fields and `null`
    /// values are `None`.
    pub fn field(&self, path: &str) -> Option<Value> {
        if path.is_empty() {
            return None;
        }

        let root = serde_json::to_value(self).ok()?;

        walk(&root, path).filter(|found| !found.is_null()).cloned()
    }

    /// A display name for failure messages: the title, falling back to the key.
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.key
        } else {
            &self.title
        }
    }
}

fn walk<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(root, |current, segment| match current {
            Value::Object(object) => object.get(segment),
            Value::Array(values) => segment
                .parse::<usize>()
                .ok()
                .and_then(|index| values.get(index)),
            _ => None,
        })
}

/// Wire shape of a storefront line item before coercion.
#[derive(Debug, Default, Deserialize)]
struct RawLineItem {
    #[serde(default)]
    key: Option<Value>,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    variant_id: Option<Value>,
    #[serde(default)]
    product_id: Option<Value>,
    #[serde(default)]
    quantity: Option<Value>,
    #[serde(default)]
    properties: Option<Value>,
    #[serde(default)]
    selling_plan_id: Option<Value>,
    #[serde(default)]
    line_price: Option<Value>,
    #[serde(default)]
    original_line_price: Option<Value>,
    #[serde(default)]
    title: Option<Value>,
    #[serde(default)]
    variant_title: Option<Value>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<RawLineItem> for LineItem {
    fn from(raw: RawLineItem) -> Self {
        let mut extra = raw.extra;

        let variant_id = match raw.variant_id.as_ref() {
            Some(value) if !value.is_null() => lenient::int(Some(value)),
            _ => lenient::int(raw.id.as_ref()),
        };

        if let Some(id) = raw.id {
            extra.insert("id".to_string(), id);
        }

        let selling_plan_id = lenient::string(raw.selling_plan_id.as_ref())
            .or_else(|| {
                let (head, rest) = SELLING_PLAN_PATH.split_once('.')?;

                lenient::string(walk(extra.get(head)?, rest))
            })
            .filter(|plan| !plan.is_empty());

        Self {
            key: lenient::string(raw.key.as_ref()).unwrap_or_default(),
            variant_id,
            product_id: lenient::int(raw.product_id.as_ref()),
            quantity: lenient::int(raw.quantity.as_ref()),
            properties: lenient::string_map(raw.properties.as_ref()),
            selling_plan_id,
            line_price: lenient::int(raw.line_price.as_ref()),
            original_line_price: lenient::int(raw.original_line_price.as_ref()),
            title: lenient::string(raw.title.as_ref()).unwrap_or_default(),
            variant_title: lenient::string(raw.variant_title.as_ref()).unwrap_or_default(),
            extra,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use testresult::TestResult;

    use super::*;

    #[test]
    fn deserializes_storefront_line() -> TestResult {
        let item: LineItem = serde_json::from_value(json!({
            "id": 111,
            "key": "111:abc",
            "product_id": 9,
            "quantity": 2,
            "properties": { "_is_gwp": "true", "Engraving": null },
            "line_price": 2000,
            "original_line_price": 2500,
            "title": "Mug",
            "variant_title": null,
            "vendor": "Acme",
            "selling_plan_allocation": { "selling_plan": { "id": 555 } }
        }))?;

        assert_eq!(item.key, "111:abc");
        assert_eq!(item.variant_id, 111);
        assert_eq!(item.product_id, 9);
        assert_eq!(item.quantity, 2);
        assert_eq!(item.properties.len(), 1);
        assert_eq!(item.selling_plan_id.as_deref(), Some("555"));
        assert_eq!(item.variant_title, "");
        assert_eq!(item.field("vendor"), Some(json!("Acme")));

        Ok(())
    }

    #[test]
    fn field_walks_dotted_paths() {
        let item = LineItem::new("k", 1, 1).with_field(
            "selling_plan_allocation",
            json!({ "selling_plan": { "id": 42, "name": "Monthly" } }),
        );

        assert_eq!(
            item.field("selling_plan_allocation.selling_plan.id"),
            Some(json!(42))
        );
        assert_eq!(item.field("quantity"), Some(json!(1)));
        assert_eq!(item.field("selling_plan_allocation.missing"), None);
        assert_eq!(item.field("quantity.deeper"), None);
        assert_eq!(item.field(""), None);
    }

    #[test]
    fn field_indexes_into_arrays() {
        let item = LineItem::new("k", 1, 1).with_field("discounts", json!([{ "title": "VIP" }]));

        assert_eq!(item.field("discounts.0.title"), Some(json!("VIP")));
        assert_eq!(item.field("discounts.3.title"), None);
    }

    #[test]
    fn missing_fields_default() -> TestResult {
        let item: LineItem = serde_json::from_value(json!({}))?;

        assert_eq!(item, LineItem::default());

        Ok(())
    }

    #[test]
    fn serialization_round_trips() -> TestResult {
        let item = LineItem::new("k1", 10, 3)
            .with_title("Tea")
            .with_line_price(900)
            .with_property("_gift", "yes")
            .with_selling_plan("77")
            .with_field("sku", json!("TEA-1"));

        let back: LineItem = serde_json::from_value(serde_json::to_value(&item)?)?;

        assert_eq!(back, item);

        Ok(())
    }
}
