use std::path::{Path, PathBuf};

use cartwatch::{engine::RuleEngine, rules::CartTest, transfer};
use clap::Args;

use super::{read_file, read_snapshot, render};

#[derive(Debug, Args)]
pub(crate) struct CheckArgs {
    /// Cart JSON to validate
    #[arg(long)]
    cart: PathBuf,

    /// Test collection, JSON or YAML
    #[arg(long)]
    tests: PathBuf,
}

pub(crate) async fn run(args: CheckArgs) -> Result<(), String> {
    let snapshot = read_snapshot(&args.cart).await?;
    let tests = read_tests(&args.tests).await?;

    for test in &tests {
        for rule in &test.rules {
            if let Err(error) = rule.validate() {
                tracing::warn!(test = %test.name, rule = %rule.name, %error, "rule is misconfigured");
            }
        }
    }

    let results = RuleEngine::new(tests).run_all_tests(&snapshot);

    println!(
        "cart: {} items, {}",
        snapshot.item_count,
        render::cart_total(&snapshot)
    );
    println!("{}", render::results_table(&results));

    let failed = results.iter().filter(|result| !result.passed).count();

    if failed > 0 {
        return Err(format!("{failed} of {} tests failed", results.len()));
    }

    Ok(())
}

async fn read_tests(path: &Path) -> Result<Vec<CartTest>, String> {
    let contents = read_file(path).await?;

    let yaml = path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| matches!(extension, "yaml" | "yml"));

    let tests = if yaml {
        transfer::import_tests_yaml(&contents)
    } else {
        transfer::import_tests_json(&contents)
    };

    tests.map_err(|error| format!("invalid tests in {}: {error}", path.display()))
}
