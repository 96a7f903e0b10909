//! Retry command - reprocess documents recorded as FALLIDO.

use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;

use facturas_core::{discovery, CsvStore, Estado};

use super::process::print_summary;
use super::{build_orchestrator, load_config, progress_bar};

/// Arguments for the retry command.
#[derive(Args)]
pub struct RetryArgs {
    /// Directory where the failed documents are looked up by name
    #[arg(short, long)]
    input_dir: Option<PathBuf>,

    /// CSV ledger holding the failed rows
    #[arg(short, long)]
    output_file: Option<PathBuf>,

    /// Seconds to wait after each document
    #[arg(long)]
    delay: Option<u64>,
}

pub async fn run(args: RetryArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(delay) = args.delay {
        config.run.completion_delay_secs = delay;
    }
    let input_dir = args.input_dir.unwrap_or_else(|| config.input.input_dir.clone());
    let output_file = args.output_file.unwrap_or_else(|| config.input.output_file.clone());

    let store = CsvStore::new(&output_file);
    if !store.exists() {
        anyhow::bail!("Ledger not found: {}", output_file.display());
    }

    let records = store.load()?;
    let skip = facturas_core::SkipSet::from_records(&records);
    let mut failed: Vec<&str> = records
        .iter()
        .filter(|r| r.estado == Estado::Fallido && !skip.contains(&r.archivo))
        .map(|r| r.archivo.as_str())
        .collect();
    failed.sort_unstable();
    failed.dedup();

    if failed.is_empty() {
        println!("{} No failed documents to retry", style("✓").green());
        return Ok(());
    }

    let orchestrator = build_orchestrator(&config)?;

    let mut documents = Vec::with_capacity(failed.len());
    for archivo in failed {
        match discovery::find_by_archivo(&input_dir, archivo) {
            Some(document) => documents.push(document),
            None => println!(
                "{} {} not found in {}, skipping",
                style("⚠").yellow(),
                archivo,
                input_dir.display()
            ),
        }
    }
    if documents.is_empty() {
        anyhow::bail!("None of the failed documents were found in {}", input_dir.display());
    }

    println!(
        "{} Retrying {} failed documents",
        style("ℹ").blue(),
        documents.len()
    );

    let pb = progress_bar(documents.len());
    let bar = pb.clone();
    let summary = orchestrator
        .run(documents, &skip, store.clone(), move |progress| {
            bar.set_position(progress.completed as u64)
        })
        .await?;
    pb.finish_and_clear();

    let (before, after) = store.deduplicate_in_place()?;
    print_summary(&summary, &output_file);
    println!(
        "{} Removed {} superseded rows in {:.1}s",
        style("✓").green(),
        before - after,
        start.elapsed().as_secs_f64()
    );

    Ok(())
}
