//! Report command - summarize failed documents.

use std::fs;
use std::path::PathBuf;

use chrono::Local;
use clap::Args;
use console::style;

use facturas_core::{CsvStore, FailureReport};

use super::load_config;

/// Arguments for the report command.
#[derive(Args)]
pub struct ReportArgs {
    /// CSV ledger to read
    #[arg(short, long)]
    output_file: Option<PathBuf>,

    /// Write the report to this file
    #[arg(long)]
    to: Option<PathBuf>,

    /// Emit JSON instead of text
    #[arg(long)]
    json: bool,
}

pub fn run(args: ReportArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let output_file = args.output_file.unwrap_or(config.input.output_file);

    let store = CsvStore::new(&output_file);
    if !store.exists() {
        anyhow::bail!("Ledger not found: {}", output_file.display());
    }

    let report = FailureReport::from_records(&store.load()?);
    let content = if args.json {
        serde_json::to_string_pretty(&report)?
    } else {
        format!(
            "Generado: {}\nArchivo: {}\n\n{}",
            Local::now().format("%Y-%m-%d %H:%M"),
            output_file.display(),
            report
        )
    };

    match args.to {
        Some(path) => {
            fs::write(&path, &content)?;
            println!(
                "{} {} failed documents, report written to {}",
                style("✓").green(),
                report.total(),
                path.display()
            );
        }
        None => println!("{}", content),
    }

    Ok(())
}
