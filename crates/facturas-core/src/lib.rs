//! Core library for Colombian invoice extraction.
//!
//! This crate provides:
//! - Structured extraction from UBL/DIAN XML companions
//! - Fallback extraction through a remote multimodal model
//! - Normalization rules (amounts, dates, NIT check digits)
//! - Resumable, rate-limited batch runs with incremental checkpoints
//! - A CSV record store with deduplication, repair and failure reports

pub mod discovery;
pub mod error;
pub mod maintenance;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod report;
pub mod resolver;
pub mod store;
pub mod structured;
pub mod vision;

pub use error::{ExtractionError, FacturasError, Result, StoreError, VisionError};
pub use models::invoice::COLUMNS;
pub use models::{Document, Estado, FacturasConfig, InvoiceRecord, NormalizedInvoice, RawExtraction, RawValue};
pub use maintenance::{repair, RepairStats};
pub use normalize::Normalizer;
pub use orchestrator::{Orchestrator, Progress, RecordSink, RunSummary, SkipSet};
pub use report::FailureReport;
pub use resolver::ExtractionResolver;
pub use store::{deduplicate, CsvStore};
pub use structured::StructuredExtractor;
pub use vision::{GeminiTransport, RetryPolicy, VisionExtractor, VisionTransport};
