//! Quantity Rules
//!
//! Minimum, maximum and pack-size constraints, per line or across the cart.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::{SmallVec, smallvec};

use crate::{
    cart::{CartSnapshot, LineItem, lenient, saturating_sum},
    rules::{Violation, de},
};

/// Which quantity a quantity rule constrains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value", rename_all = "kebab-case")]
pub enum QuantityScope {
    /// Each qualifying line on its own.
    #[default]
    PerItem,

    /// The summed quantity of all qualifying lines.
    CartTotal,
}

impl From<Value> for QuantityScope {
    fn from(value: Value) -> Self {
        match value.as_str().map(str::trim) {
            Some("cart-total" | "cart_total") => Self::CartTotal,
            _ => Self::PerItem,
        }
    }
}

/// Configuration of a quantity rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantityConfig {
    /// Per line or cart total.
    #[serde(default)]
    pub scope: QuantityScope,

    /// Inclusive lower bound.
    #[serde(default, deserialize_with = "de::bound")]
    pub min: Option<i64>,

    /// Inclusive upper bound.
    #[serde(default, deserialize_with = "de::bound")]
    pub max: Option<i64>,

    /// Required divisor; zero or negative disables the check.
    #[serde(default, deserialize_with = "de::bound")]
    pub multiple: Option<i64>,

    /// Dotted field restricting which lines count.
    #[serde(default, deserialize_with = "de::string")]
    pub filter_field: String,

    /// Expected value of `filter_field`. Empty means "field exists".
    #[serde(default)]
    pub filter_value: Value,
}

impl QuantityConfig {
    /// Per-line constraint.
    pub fn per_item() -> Self {
        Self::default()
    }

    /// Cart-total constraint.
    pub fn cart_total() -> Self {
        Self {
            scope: QuantityScope::CartTotal,
            ..Self::default()
        }
    }

    /// Set the lower bound.
    #[must_use]
    pub fn with_min(mut self, min: i64) -> Self {
        self.min = Some(min);
        self
    }

    /// Set the upper bound.
    #[must_use]
    pub fn with_max(mut self, max: i64) -> Self {
        self.max = Some(max);
        self
    }

    /// Set the divisor.
    #[must_use]
    pub fn with_multiple(mut self, multiple: i64) -> Self {
        self.multiple = Some(multiple);
        self
    }

    /// Only count lines whose `field` equals `value`.
    #[must_use]
    pub fn with_filter(mut self, field: impl Into<String>, value: Value) -> Self {
        self.filter_field = field.into();
        self.filter_value = value;
        self
    }

    /// Check every bound against the qualifying quantity or quantities.
    pub fn evaluate(&self, snapshot: &CartSnapshot) -> SmallVec<[Violation; 2]> {
        let qualifying = snapshot.items.iter().filter(|item| self.qualifies(item));

        match self.scope {
            QuantityScope::PerItem => qualifying
                .flat_map(|item| {
                    self.problems(item.quantity)
                        .into_iter()
                        .map(move |problem| {
                            Violation::item(item, format!("Quantity {} {problem}", item.quantity))
                        })
                })
                .collect(),
            QuantityScope::CartTotal => {
                let total = saturating_sum(qualifying.map(|item| item.quantity));

                self.problems(total)
                    .into_iter()
                    .map(|problem| Violation::cart(format!("Cart total quantity {total} {problem}")))
                    .collect()
            }
        }
    }

    fn qualifies(&self, item: &LineItem) -> bool {
        let field = self.filter_field.trim();

        if field.is_empty() {
            return true;
        }

        let expected = lenient::display(&self.filter_value);

        item.field(field).is_some_and(|actual| {
            let actual = lenient::display(&actual);

            if expected.is_empty() {
                !actual.is_empty()
            } else {
                actual == expected
            }
        })
    }

    fn problems(&self, quantity: i64) -> SmallVec<[String; 1]> {
        let mut problems = smallvec![];

        if let Some(min) = self.min
            && quantity < min
        {
            problems.push(format!("is below the minimum of {min}"));
        }

        if let Some(max) = self.max
            && quantity > max
        {
            problems.push(format!("is above the maximum of {max}"));
        }

        if let Some(multiple) = self.multiple.filter(|multiple| *multiple > 0)
            && quantity.checked_rem(multiple).is_some_and(|rest| rest != 0)
        {
            problems.push(format!("is not a multiple of {multiple}"));
        }

        problems
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use testresult::TestResult;

    use super::*;

    fn cart(quantities: &[i64]) -> CartSnapshot {
        CartSnapshot::with_items(
            quantities
                .iter()
                .enumerate()
                .map(|(i, quantity)| LineItem::new(format!("line-{i}"), 1, *quantity))
                .collect::<Vec<_>>(),
            "GBP",
        )
    }

    #[test]
    fn per_item_max_flags_single_line() {
        let violations = QuantityConfig::per_item().with_max(10).evaluate(&cart(&[12]));

        assert_eq!(violations.len(), 1);
        assert_eq!(
            violations.first().and_then(|v| v.item_key.as_deref()),
            Some("line-0")
        );
        assert_eq!(
            violations.first().map(|v| v.message.as_str()),
            Some("Quantity 12 is above the maximum of 10")
        );
    }

    #[test]
    fn per_item_checks_each_line_independently() {
        let violations = QuantityConfig::per_item()
            .with_min(2)
            .evaluate(&cart(&[1, 5, 1]));

        assert_eq!(violations.len(), 2);
    }

    #[test]
    fn cart_total_multiple() {
        let rule = QuantityConfig::cart_total().with_multiple(5);

        let violations = rule.evaluate(&cart(&[4, 8]));

        assert_eq!(violations.len(), 1);
        assert_eq!(
            violations.first().map(|v| v.message.as_str()),
            Some("Cart total quantity 12 is not a multiple of 5")
        );
        assert_eq!(violations.first().and_then(|v| v.item_key.clone()), None);

        assert!(rule.evaluate(&cart(&[4, 6])).is_empty());
    }

    #[test]
    fn filter_restricts_counted_lines() {
        let snapshot = CartSnapshot::with_items(
            [
                LineItem::new("a", 1, 3).with_field("vendor", json!("Acme")),
                LineItem::new("b", 1, 9).with_field("vendor", json!("Other")),
            ],
            "GBP",
        );

        let rule = QuantityConfig::cart_total()
            .with_max(5)
            .with_filter("vendor", json!("Acme"));

        assert!(rule.evaluate(&snapshot).is_empty());

        let rule = QuantityConfig::cart_total()
            .with_max(5)
            .with_filter("vendor", json!(""));

        assert_eq!(rule.evaluate(&snapshot).len(), 1);
    }

    #[test]
    fn null_and_empty_bounds_are_unchecked() -> TestResult {
        let rule: QuantityConfig = serde_json::from_value(json!({
            "scope": "per-item",
            "min": "",
            "max": null,
            "multiple": null
        }))?;

        assert_eq!(rule.min, None);
        assert_eq!(rule.max, None);
        assert_eq!(rule.multiple, None);
        assert!(rule.evaluate(&cart(&[1, 1000])).is_empty());

        Ok(())
    }

    #[test]
    fn string_bounds_and_zero_multiple() -> TestResult {
        let rule: QuantityConfig = serde_json::from_value(json!({
            "scope": "cart-total",
            "max": "10",
            "multiple": 0
        }))?;

        assert_eq!(rule.scope, QuantityScope::CartTotal);
        assert_eq!(rule.max, Some(10));
        assert!(rule.evaluate(&cart(&[3, 4])).is_empty());
        assert_eq!(rule.evaluate(&cart(&[6, 7])).len(), 1);

        Ok(())
    }

    #[test]
    fn huge_quantities_saturate() -> TestResult {
        let snapshot = CartSnapshot::from_json(
            r#"{"items":[{"key":"a","id":1,"quantity":"9223372036854775807"},{"key":"b","id":2,"quantity":1}]}"#,
        )?;

        let violations = QuantityConfig::cart_total().with_max(10).evaluate(&snapshot);

        assert_eq!(violations.len(), 1);
        assert_eq!(snapshot.quantity_total(), i64::MAX);

        let extremes = cart(&[i64::MIN, -1]);

        assert_eq!(extremes.quantity_total(), i64::MIN);
        assert!(
            QuantityConfig::per_item()
                .with_multiple(-1)
                .evaluate(&extremes)
                .is_empty()
        );
        assert_eq!(
            QuantityConfig::cart_total()
                .with_multiple(3)
                .evaluate(&extremes)
                .len(),
            1
        );

        Ok(())
    }
}
