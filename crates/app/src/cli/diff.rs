use std::path::PathBuf;

use cartwatch::diff::diff;
use clap::Args;

use super::{read_snapshot, render};

#[derive(Debug, Args)]
pub(crate) struct DiffArgs {
    /// Earlier cart JSON (as returned by /cart.js)
    #[arg(long)]
    previous: PathBuf,

    /// Later cart JSON
    #[arg(long)]
    current: PathBuf,
}

pub(crate) async fn run(args: DiffArgs) -> Result<(), String> {
    let previous = read_snapshot(&args.previous).await?;
    let current = read_snapshot(&args.current).await?;

    let delta = diff(&previous, &current);

    println!("{}", delta.summary());

    if delta.is_empty() {
        return Ok(());
    }

    if !delta.added.is_empty() || !delta.removed.is_empty() || !delta.modified.is_empty() {
        println!("{}", render::diff_table(&delta));
    }

    if delta.note_changed {
        println!("note changed");
    }
    if delta.attributes_changed {
        println!("attributes changed");
    }
    if delta.discount_changed {
        println!("discount codes changed");
    }

    println!(
        "total: {} -> {}",
        render::cart_total(&previous),
        render::cart_total(&current)
    );

    Ok(())
}
