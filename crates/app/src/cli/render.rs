use cartwatch::{cart::CartSnapshot, diff::CartDiff, engine::TestResult, history::HistoryEntry};
use tabled::{
    builder::Builder,
    settings::{Style, object::Rows, Color},
};

pub(crate) fn diff_table(diff: &CartDiff) -> String {
    let mut builder = Builder::default();

    builder.push_record(["Change", "Key", "Title", "Quantity"]);

    for item in &diff.added {
        builder.push_record([
            "added".to_string(),
            item.key.clone(),
            item.display_title().to_string(),
            item.quantity.to_string(),
        ]);
    }

    for item in &diff.removed {
        builder.push_record([
            "removed".to_string(),
            item.key.clone(),
            item.display_title().to_string(),
            item.quantity.to_string(),
        ]);
    }

    for modified in &diff.modified {
        builder.push_record([
            "modified".to_string(),
            modified.item.key.clone(),
            modified.item.display_title().to_string(),
            format!("{} -> {}", modified.old_quantity, modified.new_quantity),
        ]);
    }

    finish(builder)
}

pub(crate) fn results_table(results: &[TestResult]) -> String {
    let mut builder = Builder::default();

    builder.push_record(["Test", "Result", "Rule", "Item", "Message"]);

    for result in results {
        if result.passed {
            builder.push_record([
                result.test_name.clone(),
                "pass".to_string(),
                String::new(),
                String::new(),
                String::new(),
            ]);
            continue;
        }

        for failure in &result.failures {
            builder.push_record([
                result.test_name.clone(),
                "FAIL".to_string(),
                failure.rule_name.clone(),
                failure.item_title.clone().unwrap_or_default(),
                failure.message.clone(),
            ]);
        }
    }

    finish(builder)
}

pub(crate) fn history_table(entries: &[HistoryEntry]) -> String {
    let mut builder = Builder::default();

    builder.push_record(["#", "Recorded", "Change", "Items", "Total"]);

    for (index, entry) in entries.iter().enumerate() {
        builder.push_record([
            index.to_string(),
            entry.timestamp.to_string(),
            entry.label.clone(),
            entry.snapshot.item_count.to_string(),
            cart_total(&entry.snapshot),
        ]);
    }

    finish(builder)
}

pub(crate) fn cart_total(snapshot: &CartSnapshot) -> String {
    snapshot.total().map_or_else(
        || format!("{} {}", snapshot.total_price, snapshot.currency),
        |total| total.to_string(),
    )
}

fn finish(builder: Builder) -> String {
    let mut table = builder.build();

    table.with(Style::modern_rounded());
    table.modify(Rows::first(), Color::BOLD);

    table.to_string()
}
