//! Data models for invoice records and pipeline configuration.

pub mod config;
pub mod invoice;

pub use config::FacturasConfig;
pub use invoice::{Document, Estado, InvoiceRecord, NormalizedInvoice, RawExtraction, RawValue};
