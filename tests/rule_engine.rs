//! Integration tests for rule evaluation

use jiff::Timestamp;
use serde_json::json;
use testresult::TestResult;

use cartwatch::prelude::*;

fn quantity_test(config: QuantityConfig) -> CartTest {
    CartTest::new(
        "Quantities",
        [Rule::new("quantity", RuleKind::Quantity(config))],
    )
}

fn cart(quantities: &[i64]) -> CartSnapshot {
    CartSnapshot::with_items(
        quantities
            .iter()
            .enumerate()
            .map(|(i, quantity)| LineItem::new(format!("line-{i}"), 1, *quantity).with_title(format!("Line {i}")))
            .collect::<Vec<_>>(),
        "GBP",
    )
}

#[test]
fn per_item_max_yields_one_failure_for_the_item() {
    let result = run_test(&quantity_test(QuantityConfig::per_item().with_max(10)), &cart(&[12]));

    assert!(!result.passed);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(
        result.failures.first().and_then(|f| f.item_key.as_deref()),
        Some("line-0")
    );
}

#[test]
fn cart_total_multiple_checks_the_sum() {
    let test = quantity_test(QuantityConfig::cart_total().with_multiple(5));

    assert_eq!(run_test(&test, &cart(&[4, 8])).failures.len(), 1);
    assert!(run_test(&test, &cart(&[4, 6])).passed);
}

#[test]
fn property_dependency_lists_missing_names() -> TestResult {
    let test: CartTest = serde_json::from_value(json!({
        "name": "GWP",
        "rules": [{
            "name": "GWP needs metadata",
            "type": "property-dependency",
            "config": {
                "ifProperty": { "key": "_is_gwp", "operator": "equals", "value": "true" },
                "requiredProperties": ["_gwp_price", "_gwp_source"]
            }
        }]
    }))?;

    let missing = CartSnapshot::with_items(
        [LineItem::new("gift", 1, 1).with_property("_is_gwp", "true")],
        "GBP",
    );

    let result = run_test(&test, &missing);

    assert_eq!(result.failures.len(), 1);

    let message = result.failures.first().map(|f| f.message.as_str()).unwrap_or_default();

    assert!(message.contains("_gwp_price"), "message should name _gwp_price: {message}");
    assert!(message.contains("_gwp_source"), "message should name _gwp_source: {message}");

    let complete = CartSnapshot::with_items(
        [LineItem::new("gift", 1, 1)
            .with_property("_is_gwp", "true")
            .with_property("_gwp_price", "0")
            .with_property("_gwp_source", "auto")],
        "GBP",
    );

    assert!(run_test(&test, &complete).passed);

    Ok(())
}

#[test]
fn repeated_runs_are_identical() -> TestResult {
    let test = CartTest::new(
        "Mixed",
        [
            Rule::new("max", RuleKind::Quantity(QuantityConfig::per_item().with_max(2))),
            Rule::new(
                "vendor",
                RuleKind::FieldValue(FieldValueConfig {
                    if_field: Condition::field("quantity", Operator::GreaterThan, json!(0)),
                    then_field: Condition::field("vendor", Operator::Exists, serde_json::Value::Null),
                }),
            ),
        ],
    );
    let snapshot = cart(&[1, 3, 5]);
    let at: Timestamp = "2026-03-01T09:30:00Z".parse()?;

    let first = serde_json::to_vec(&run_test_at(&test, &snapshot, at))?;
    let second = serde_json::to_vec(&run_test_at(&test, &snapshot, at))?;

    assert_eq!(first, second);

    Ok(())
}

#[test]
fn broken_definitions_do_not_stop_other_tests() -> TestResult {
    let tests: Vec<CartTest> = serde_json::from_value(json!([
        { "name": "Broken", "rules": [
            { "type": "field-value", "config": { "ifField": null, "thenField": 7 } },
            { "type": "cart-composition" },
            { "type": "no-such-rule", "config": [] }
        ]},
        { "name": "Working", "rules": [
            { "type": "quantity", "config": { "scope": "per-item", "max": "1" } }
        ]}
    ]))?;

    let engine = RuleEngine::new(tests);
    let results = engine.run_all_tests(&cart(&[2]));

    assert_eq!(results.len(), 2);
    assert!(results.first().is_some_and(|r| r.passed), "broken test should not fail");
    assert!(results.get(1).is_some_and(|r| !r.passed), "working test should fail");

    Ok(())
}
