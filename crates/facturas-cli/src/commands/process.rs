//! Process command - run the extraction pipeline over the input directory.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;

use facturas_core::normalize::format_colombian_amount;
use facturas_core::{discovery, CsvStore, RunSummary, SkipSet};

use super::{build_orchestrator, load_config, progress_bar};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Directory scanned recursively for invoices
    #[arg(short, long)]
    input_dir: Option<PathBuf>,

    /// CSV ledger to append to
    #[arg(short, long)]
    output_file: Option<PathBuf>,

    /// Delete the ledger and start from scratch
    #[arg(long)]
    reset: bool,

    /// Maximum documents in flight
    #[arg(long)]
    concurrency: Option<usize>,

    /// Seconds to wait after each document
    #[arg(long)]
    delay: Option<u64>,

    /// Documents buffered between ledger writes
    #[arg(long)]
    checkpoint_every: Option<usize>,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(concurrency) = args.concurrency {
        config.run.concurrency = concurrency;
    }
    if let Some(delay) = args.delay {
        config.run.completion_delay_secs = delay;
    }
    if let Some(every) = args.checkpoint_every {
        config.run.checkpoint_every = every;
    }
    let input_dir = args.input_dir.unwrap_or_else(|| config.input.input_dir.clone());
    let output_file = args.output_file.unwrap_or_else(|| config.input.output_file.clone());

    let orchestrator = build_orchestrator(&config)?;

    if !input_dir.exists() {
        fs::create_dir_all(&input_dir)?;
        println!(
            "{} Created input directory {}",
            style("ℹ").blue(),
            input_dir.display()
        );
    }

    let store = CsvStore::new(&output_file);
    if args.reset && store.exists() {
        fs::remove_file(store.path())?;
        println!(
            "{} Removed {} to start from scratch",
            style("ℹ").blue(),
            output_file.display()
        );
    }

    let documents = discovery::discover(&input_dir, &config.input.extensions);
    if documents.is_empty() {
        anyhow::bail!(
            "No invoice files found in {}. Add PDF or image files and run again.",
            input_dir.display()
        );
    }

    let (existing, unreadable) = store.load_readable()?;
    if unreadable > 0 {
        println!(
            "{} Skipped {} unreadable rows in {}, their documents will be processed again",
            style("⚠").yellow(),
            unreadable,
            output_file.display()
        );
    }
    let skip = SkipSet::from_records(&existing);
    let pending = documents.iter().filter(|d| !skip.contains(&d.archivo)).count();
    println!(
        "{} Found {} files, {} already processed, {} pending",
        style("ℹ").blue(),
        documents.len(),
        documents.len() - pending,
        pending
    );

    let pb = progress_bar(pending);
    let bar = pb.clone();
    let summary = orchestrator
        .run(documents, &skip, store.clone(), move |progress| {
            bar.set_position(progress.completed as u64)
        })
        .await?;
    pb.finish_and_clear();

    print_summary(&summary, &output_file);
    let ledger_total: f64 = store
        .load()?
        .iter()
        .filter(|r| r.estado.is_success())
        .filter_map(|r| r.total)
        .sum();
    println!("  Ledger total: $ {}", format_colombian_amount(ledger_total));
    println!(
        "{} Finished in {:.1}s",
        style("✓").green(),
        start.elapsed().as_secs_f64()
    );

    Ok(())
}

pub fn print_summary(summary: &RunSummary, output_file: &std::path::Path) {
    println!();
    println!("{}", style("Summary").bold());
    println!("  Total files:  {}", summary.total);
    println!("  Skipped:      {}", summary.skipped);
    println!("  Succeeded:    {}", style(summary.succeeded).green());
    if summary.failed > 0 {
        println!("  Failed:       {}", style(summary.failed).red());
    } else {
        println!("  Failed:       {}", summary.failed);
    }
    println!("  Ledger:       {}", output_file.display());
}
