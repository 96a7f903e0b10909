//! Failure report over the persisted store.

use std::fmt;

use serde::Serialize;

use crate::models::{Estado, InvoiceRecord};

/// Marker of requests the remote service rejected as malformed.
pub const INVALID_ARGUMENT: &str = "INVALID_ARGUMENT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDocument {
    pub archivo: String,
    pub nota: String,
}

/// `FALLIDO` rows grouped by cause.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FailureReport {
    /// Documents rejected with `INVALID_ARGUMENT`.
    pub invalid_argument: Vec<FailedDocument>,
    pub other: Vec<FailedDocument>,
}

impl FailureReport {
    pub fn from_records(records: &[InvoiceRecord]) -> Self {
        let mut report = Self::default();
        for record in records.iter().filter(|r| r.estado == Estado::Fallido) {
            let failed = FailedDocument {
                archivo: record.archivo.clone(),
                nota: record.nota.clone().unwrap_or_default(),
            };
            if failed.nota.contains(INVALID_ARGUMENT) {
                report.invalid_argument.push(failed);
            } else {
                report.other.push(failed);
            }
        }
        report
    }

    pub fn total(&self) -> usize {
        self.invalid_argument.len() + self.other.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "No hay facturas fallidas.");
        }

        writeln!(f, "REPORTE DE FACTURAS FALLIDAS")?;
        writeln!(f, "============================")?;
        writeln!(f)?;

        if !self.invalid_argument.is_empty() {
            writeln!(f, "ERROR: {} (Total: {})", INVALID_ARGUMENT, self.invalid_argument.len())?;
            writeln!(
                f,
                "Posibles causas: archivo corrupto, protegido con contraseña, formato no soportado o nombre de archivo problemático."
            )?;
            writeln!(f, "{}", "-".repeat(80))?;
            for failed in &self.invalid_argument {
                writeln!(f, "- {}", failed.archivo)?;
            }
            writeln!(f)?;
        }

        if !self.other.is_empty() {
            writeln!(f, "OTROS ERRORES (Total: {})", self.other.len())?;
            writeln!(f, "{}", "-".repeat(80))?;
            for failed in &self.other {
                writeln!(f, "- {}", failed.archivo)?;
                writeln!(f, "  Error: {}", failed.nota.replace('\n', " "))?;
            }
            writeln!(f)?;
        }

        writeln!(f, "============================")?;
        writeln!(f, "Total fallidos: {}", self.total())
    }
}
