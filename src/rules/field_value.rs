//! Field Value Rules
//!
//! If a line matches one field condition it must also match another.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{
    cart::CartSnapshot,
    rules::{
        Violation,
        condition::{Condition, ConditionSource, matches_condition},
    },
};

/// Configuration of a field value rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldValueConfig {
    /// Trigger condition on a dotted field path.
    #[serde(default)]
    pub if_field: Condition,

    /// Condition every triggered line must satisfy.
    #[serde(default)]
    pub then_field: Condition,
}

impl FieldValueConfig {
    /// One violation per triggered line failing the `then` condition.
    pub fn evaluate(&self, snapshot: &CartSnapshot) -> SmallVec<[Violation; 2]> {
        if !self.then_field.is_well_formed(ConditionSource::Field) {
            return SmallVec::new();
        }

        snapshot
            .items
            .iter()
            .filter(|item| matches_condition(item, &self.if_field, ConditionSource::Field))
            .filter(|item| !matches_condition(item, &self.then_field, ConditionSource::Field))
            .map(|item| {
                Violation::item(
                    item,
                    format!(
                        "Expected {}",
                        self.then_field.describe(ConditionSource::Field)
                    ),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use crate::{cart::LineItem, rules::condition::Operator};

    use super::*;

    fn subscription_rule() -> FieldValueConfig {
        FieldValueConfig {
            if_field: Condition::field(
                "selling_plan_allocation.selling_plan.id",
                Operator::Exists,
                Value::Null,
            ),
            then_field: Condition::field("quantity", Operator::LessThan, json!(3)),
        }
    }

    fn subscription(key: &str, quantity: i64) -> LineItem {
        LineItem::new(key, 1, quantity).with_field(
            "selling_plan_allocation",
            json!({ "selling_plan": { "id": 77 } }),
        )
    }

    #[test]
    fn flags_triggered_lines_failing_then() {
        let cart = CartSnapshot::with_items(
            [
                subscription("ok", 1),
                subscription("too-many", 4),
                LineItem::new("one-off", 1, 10),
            ],
            "USD",
        );

        let violations = subscription_rule().evaluate(&cart);

        assert_eq!(violations.len(), 1);
        assert_eq!(
            violations.first().and_then(|v| v.item_key.as_deref()),
            Some("too-many")
        );
        assert_eq!(
            violations.first().map(|v| v.message.as_str()),
            Some("Expected quantity less-than 3")
        );
    }

    #[test]
    fn malformed_then_condition_yields_nothing() {
        let rule = FieldValueConfig {
            then_field: Condition::field("quantity", Operator::Unknown(json!("approx")), json!(3)),
            ..subscription_rule()
        };
        let cart = CartSnapshot::with_items([subscription("a", 9)], "USD");

        assert!(rule.evaluate(&cart).is_empty());
    }
}
