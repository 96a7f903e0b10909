//! Fix command - repair rows written by older runs.

use std::path::PathBuf;

use clap::Args;
use console::style;

use facturas_core::normalize::Normalizer;
use facturas_core::{repair, CsvStore};

use super::load_config;

/// Arguments for the fix command.
#[derive(Args)]
pub struct FixArgs {
    /// CSV ledger to repair
    #[arg(short, long)]
    output_file: Option<PathBuf>,

    /// Recover missing dates of XML-sourced rows from this directory
    #[arg(short, long)]
    input_dir: Option<PathBuf>,

    /// Report what would change without writing
    #[arg(long)]
    dry_run: bool,
}

pub fn run(args: FixArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let output_file = args.output_file.unwrap_or(config.input.output_file);

    let store = CsvStore::new(&output_file);
    if !store.exists() {
        anyhow::bail!("Ledger not found: {}", output_file.display());
    }

    let normalizer = Normalizer::from_config(&config.normalize);
    let (records, stats) = repair(store.load()?, &normalizer, args.input_dir.as_deref());

    println!(
        "{} {} rows checked, {} changed, {} dates recovered",
        style("ℹ").blue(),
        stats.checked,
        stats.changed,
        stats.dates_recovered
    );

    if args.dry_run {
        println!("{} Dry run, ledger left untouched", style("ℹ").blue());
    } else if stats.changed > 0 {
        store.rewrite(&records)?;
        println!("{} Saved {}", style("✓").green(), output_file.display());
    } else {
        println!("{} Nothing to fix", style("✓").green());
    }

    Ok(())
}
