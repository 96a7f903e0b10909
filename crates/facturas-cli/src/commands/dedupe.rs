//! Dedupe command - keep one row per document.

use std::path::PathBuf;

use clap::Args;
use console::style;

use facturas_core::{deduplicate, CsvStore};

use super::load_config;

/// Arguments for the dedupe command.
#[derive(Args)]
pub struct DedupeArgs {
    /// CSV ledger to deduplicate
    #[arg(short, long)]
    output_file: Option<PathBuf>,

    /// Write the result here instead of rewriting the ledger
    #[arg(long)]
    to: Option<PathBuf>,
}

pub fn run(args: DedupeArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let output_file = args.output_file.unwrap_or(config.input.output_file);

    let store = CsvStore::new(&output_file);
    if !store.exists() {
        anyhow::bail!("Ledger not found: {}", output_file.display());
    }

    let records = store.load()?;
    let before = records.len();
    let unique = deduplicate(records);

    let target = args.to.map(CsvStore::new).unwrap_or(store);
    target.rewrite(&unique)?;

    println!(
        "{} {} rows -> {} rows ({} duplicates removed), saved to {}",
        style("✓").green(),
        before,
        unique.len(),
        before - unique.len(),
        target.path().display()
    );

    Ok(())
}
