//! CLI application for batch invoice extraction into a CSV ledger.

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{config, dedupe, fix, process, report, retry};

/// Facturas - Extract Colombian invoices into a normalized CSV ledger
#[derive(Parser)]
#[command(name = "facturas")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every pending invoice in the input directory
    Process(process::ProcessArgs),

    /// Reprocess documents recorded as FALLIDO
    Retry(retry::RetryArgs),

    /// Remove duplicate rows from the ledger
    Dedupe(dedupe::DedupeArgs),

    /// Re-apply normalization to stored rows
    Fix(fix::FixArgs),

    /// Summarize failed documents
    Report(report::ReportArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Credentials may live in a local .env file
    dotenvy::dotenv().ok();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Process(args) => process::run(args, config_path).await,
        Commands::Retry(args) => retry::run(args, config_path).await,
        Commands::Dedupe(args) => dedupe::run(args, config_path),
        Commands::Fix(args) => fix::run(args, config_path),
        Commands::Report(args) => report::run(args, config_path),
        Commands::Config(args) => config::run(args, config_path),
    }
}
