//! Repairs applied to an existing store.
//!
//! Rows written by older runs may carry day-first or ISO dates, hyphenated
//! tax ids, missing check digits, or totals off by a factor of 1000.
//! Re-running normalization over the stored values fixes all of them and
//! leaves already normalized rows untouched.

use std::path::Path;

use tracing::{debug, info};

use crate::discovery::find_by_archivo;
use crate::models::{Estado, InvoiceRecord, RawExtraction};
use crate::normalize::Normalizer;
use crate::structured::StructuredExtractor;

/// Counters reported by [`repair`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairStats {
    /// Successful rows normalized again.
    pub checked: usize,
    /// Rows whose content changed.
    pub changed: usize,
    /// Rows whose missing dates were recovered from the XML companion.
    pub dates_recovered: usize,
}

/// Normalize a stored row again. Failed rows are returned unchanged.
pub fn renormalize(record: &InvoiceRecord, normalizer: &Normalizer) -> InvoiceRecord {
    if !record.estado.is_success() {
        return record.clone();
    }
    let raw = RawExtraction::from(record);
    InvoiceRecord::success(&record.archivo, record.estado, normalizer.normalize(&raw))
}

/// Fill empty dates of an XML-sourced row from its companion. Returns
/// whether anything was filled.
pub fn recover_dates(
    record: &mut InvoiceRecord,
    companion: &Path,
    extractor: &StructuredExtractor,
    normalizer: &Normalizer,
) -> bool {
    let raw = match extractor.extract(companion) {
        Ok(raw) => raw,
        Err(err) => {
            debug!("{}: cannot re-read companion: {}", record.archivo, err);
            return false;
        }
    };
    let fresh = normalizer.normalize(&raw);

    let mut filled = false;
    if record.fecha.is_empty() && !fresh.fecha.is_empty() {
        record.fecha = fresh.fecha;
        filled = true;
    }
    if record.fecha_vencimiento.is_empty() && !fresh.fecha_vencimiento.is_empty() {
        record.fecha_vencimiento = fresh.fecha_vencimiento;
        filled = true;
    }
    filled
}

/// Re-normalize every successful row. With `input_dir`, rows extracted from
/// XML that still lack a date are re-read from their companion.
pub fn repair(
    records: Vec<InvoiceRecord>,
    normalizer: &Normalizer,
    input_dir: Option<&Path>,
) -> (Vec<InvoiceRecord>, RepairStats) {
    let extractor = StructuredExtractor::new();
    let mut stats = RepairStats::default();

    let repaired = records
        .into_iter()
        .map(|record| {
            if !record.estado.is_success() {
                return record;
            }
            stats.checked += 1;
            let mut fixed = renormalize(&record, normalizer);

            if let Some(dir) = input_dir {
                if fixed.estado == Estado::ExitosoXml && fixed.fecha.is_empty() {
                    let companion = find_by_archivo(dir, &fixed.archivo)
                        .and_then(|document| document.companion());
                    if let Some(companion) = companion {
                        if recover_dates(&mut fixed, &companion, &extractor, normalizer) {
                            stats.dates_recovered += 1;
                        }
                    }
                }
            }

            if fixed != record {
                stats.changed += 1;
            }
            fixed
        })
        .collect();

    info!(
        "Repair: {} rows checked, {} changed, {} dates recovered",
        stats.checked, stats.changed, stats.dates_recovered
    );
    (repaired, stats)
}
