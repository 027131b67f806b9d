//! Property Dependency Rules
//!
//! Lines carrying a trigger property must also carry a set of companion
//! properties (e.g. a gift-with-purchase flag and its price/source).

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{
    cart::CartSnapshot,
    rules::{
        Violation,
        condition::{Condition, ConditionSource, matches_condition},
        de,
    },
};

/// Configuration of a property dependency rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDependencyConfig {
    /// Trigger condition, evaluated against line item properties.
    #[serde(default)]
    pub if_property: Condition,

    /// Properties every triggered line must carry.
    #[serde(default, deserialize_with = "de::string_list")]
    pub required_properties: Vec<String>,
}

impl PropertyDependencyConfig {
    /// One violation per triggered line listing all of its missing properties.
    pub fn evaluate(&self, snapshot: &CartSnapshot) -> SmallVec<[Violation; 2]> {
        if self.required_properties.is_empty() {
            return SmallVec::new();
        }

        snapshot
            .items
            .iter()
            .filter(|item| matches_condition(item, &self.if_property, ConditionSource::Property))
            .filter_map(|item| {
                let missing: Vec<&str> = self
                    .required_properties
                    .iter()
                    .filter(|name| !item.properties.contains_key(name.as_str()))
                    .map(String::as_str)
                    .collect();

                if missing.is_empty() {
                    None
                } else {
                    Some(Violation::item(
                        item,
                        format!("Missing required properties: {}", missing.join(", ")),
                    ))
                }
            })
            .collect()
    }
}
