//! CLI subcommands.

pub mod config;
pub mod dedupe;
pub mod fix;
pub mod process;
pub mod report;
pub mod retry;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use facturas_core::models::FacturasConfig;
use facturas_core::normalize::Normalizer;
use facturas_core::vision::{GeminiTransport, VisionExtractor};
use facturas_core::{ExtractionResolver, Orchestrator, VisionError};
use indicatif::{ProgressBar, ProgressStyle};

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("facturas")
        .join("config.json")
}

/// Load the explicit config file, else the default one if present, else defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<FacturasConfig> {
    if let Some(path) = config_path {
        return Ok(FacturasConfig::from_file(Path::new(path))?);
    }
    let default_path = default_config_path();
    if default_path.exists() {
        Ok(FacturasConfig::from_file(&default_path)?)
    } else {
        Ok(FacturasConfig::default())
    }
}

/// Build the full extraction pipeline against the Gemini API.
pub fn build_orchestrator(config: &FacturasConfig) -> anyhow::Result<Orchestrator> {
    let transport = match GeminiTransport::from_env(&config.vision) {
        Ok(transport) => transport,
        Err(VisionError::MissingApiKey) => anyhow::bail!(
            "GOOGLE_API_KEY is not set. Export it or add it to a .env file in the working directory."
        ),
        Err(err) => return Err(err.into()),
    };

    let vision = VisionExtractor::from_config(Arc::new(transport), config);
    let resolver = ExtractionResolver::new(Arc::new(vision))
        .with_normalizer(Normalizer::from_config(&config.normalize));
    Ok(Orchestrator::from_config(Arc::new(resolver), &config.run))
}

pub fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb
}
