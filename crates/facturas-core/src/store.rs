//! CSV-backed record store.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::models::InvoiceRecord;
use crate::orchestrator::{RecordSink, SkipSet};

/// Persisted table of invoice records, one row per processed document.
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Load every row. A missing file is an empty store.
    pub fn load(&self) -> Result<Vec<InvoiceRecord>, StoreError> {
        if !self.exists() {
            debug!("Store {} does not exist yet", self.path.display());
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)?;
        let records = reader
            .deserialize()
            .collect::<Result<Vec<InvoiceRecord>, _>>()?;
        debug!("Loaded {} records from {}", records.len(), self.path.display());
        Ok(records)
    }

    /// Load every row that deserializes, logging and skipping the others.
    /// Returns the readable records and the number of rows skipped.
    pub fn load_readable(&self) -> Result<(Vec<InvoiceRecord>, usize), StoreError> {
        if !self.exists() {
            return Ok((Vec::new(), 0));
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)?;
        let mut records = Vec::new();
        let mut skipped = 0;
        for row in reader.deserialize::<InvoiceRecord>() {
            match row {
                Ok(record) => records.push(record),
                Err(err) if err.is_io_error() => return Err(err.into()),
                Err(err) => {
                    let line = err.position().map(|p| p.line()).unwrap_or_default();
                    warn!(
                        "Skipping unreadable row at line {} of {}: {}",
                        line,
                        self.path.display(),
                        err
                    );
                    skipped += 1;
                }
            }
        }
        Ok((records, skipped))
    }

    /// Snapshot of the documents already processed successfully. Unreadable
    /// rows are skipped, so their documents are processed again.
    pub fn skip_set(&self) -> Result<SkipSet, StoreError> {
        let (records, _) = self.load_readable()?;
        Ok(SkipSet::from_records(&records))
    }

    /// Append rows, writing the header only when the file is new or empty.
    pub fn append(&self, records: &[InvoiceRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let write_header = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        debug!("Appended {} records to {}", records.len(), self.path.display());
        Ok(())
    }

    /// Replace the whole store with `records`.
    pub fn rewrite(&self, records: &[InvoiceRecord]) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp)?;
            if records.is_empty() {
                writer.write_record(crate::models::invoice::COLUMNS)?;
            }
            for record in records {
                writer.serialize(record)?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;
        info!("Wrote {} records to {}", records.len(), self.path.display());
        Ok(())
    }

    /// Deduplicate the persisted rows in place. Returns `(before, after)` counts.
    pub fn deduplicate_in_place(&self) -> Result<(usize, usize), StoreError> {
        let records = self.load()?;
        let before = records.len();
        let unique = deduplicate(records);
        let after = unique.len();
        self.rewrite(&unique)?;
        Ok((before, after))
    }
}

impl RecordSink for CsvStore {
    fn append(&mut self, records: &[InvoiceRecord]) -> Result<(), StoreError> {
        CsvStore::append(self, records)
    }
}

/// Keep one row per `archivo`: the one with the most populated columns.
/// Ties keep the earliest row, except between two failures where the latest
/// one carries the current `nota`. The result is ordered by `archivo`.
pub fn deduplicate(records: Vec<InvoiceRecord>) -> Vec<InvoiceRecord> {
    let mut best: BTreeMap<String, InvoiceRecord> = BTreeMap::new();
    for record in records {
        match best.get(&record.archivo) {
            Some(kept) if !supersedes(&record, kept) => {}
            _ => {
                best.insert(record.archivo.clone(), record);
            }
        }
    }
    best.into_values().collect()
}

fn supersedes(candidate: &InvoiceRecord, kept: &InvoiceRecord) -> bool {
    match candidate.filled_fields().cmp(&kept.filled_fields()) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Equal => !candidate.estado.is_success() && !kept.estado.is_success(),
        std::cmp::Ordering::Less => false,
    }
}
