//! Configuration structures for the extraction pipeline.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Main configuration for the facturas pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FacturasConfig {
    /// Remote vision service configuration.
    pub vision: VisionConfig,

    /// Rate-limit retry policy for generation requests.
    pub retry: RetryConfig,

    /// Batch run configuration.
    pub run: RunConfig,

    /// Normalization rules configuration.
    pub normalize: NormalizeConfig,

    /// Input discovery configuration.
    pub input: InputConfig,
}

/// Remote vision service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Base URL of the generative language API.
    pub api_base: String,

    /// Model used for generation requests.
    pub model: String,

    /// Seconds between file state polls.
    pub poll_interval_secs: u64,

    /// Maximum number of polls before giving up on a processing file.
    pub max_polls: u32,

    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.0-flash".to_string(),
            poll_interval_secs: 2,
            max_polls: 60,
            request_timeout_secs: 120,
        }
    }
}

impl VisionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Retry policy configuration for rate-limited requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,

    /// Base delay in seconds, doubled on each attempt.
    pub base_delay_secs: u64,

    /// Add random jitter on top of each delay.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 10,
            jitter: true,
        }
    }
}

/// Batch run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Maximum simultaneous resolutions. The free API tier allows only a few
    /// requests per minute.
    pub concurrency: usize,

    /// Seconds to wait after each resolution before releasing its slot.
    pub completion_delay_secs: u64,

    /// Flush completed records to the store every N completions.
    pub checkpoint_every: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            completion_delay_secs: 15,
            checkpoint_every: 5,
        }
    }
}

impl RunConfig {
    pub fn completion_delay(&self) -> Duration {
        Duration::from_secs(self.completion_delay_secs)
    }
}

/// Normalization rules configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Positive totals below this value are treated as mis-scaled.
    pub implausible_threshold: f64,

    /// Factor applied to mis-scaled totals.
    pub implausible_multiplier: f64,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            implausible_threshold: 500.0,
            implausible_multiplier: 1000.0,
        }
    }
}

/// Input discovery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Default input directory.
    pub input_dir: PathBuf,

    /// Default output CSV file.
    pub output_file: PathBuf,

    /// Document extensions to pick up (case-insensitive).
    pub extensions: Vec<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("invoices_input"),
            output_file: PathBuf::from("gastos.csv"),
            extensions: ["pdf", "png", "jpg", "jpeg", "webp"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

impl FacturasConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}
