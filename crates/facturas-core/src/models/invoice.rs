//! Invoice data models: raw extractions, normalized records and input documents.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Untyped value as produced by an extractor, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl RawValue {
    /// Render the value as trimmed text. Whole numbers print without a fraction.
    pub fn as_text(&self) -> String {
        match self {
            RawValue::Text(s) => s.trim().to_string(),
            RawValue::Number(n) if n.is_finite() && n.fract() == 0.0 => format!("{:.0}", n),
            RawValue::Number(n) => n.to_string(),
        }
    }

    /// Convert a JSON scalar. Anything other than a string or a number is absent.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(RawValue::Text(s.clone())),
            serde_json::Value::Number(n) => n.as_f64().map(RawValue::Number),
            _ => None,
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        RawValue::Number(n)
    }
}

/// Fields extracted from a document, keyed by the canonical vocabulary.
///
/// Every field is optional: an absent value is not an error. Values stay
/// untyped until [`crate::normalize::normalize`] consumes the extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawExtraction {
    pub proveedor: Option<RawValue>,
    pub nit: Option<RawValue>,
    pub direccion: Option<RawValue>,
    pub telefono: Option<RawValue>,
    pub ciudad: Option<RawValue>,
    pub factura_numero: Option<RawValue>,
    pub fecha: Option<RawValue>,
    pub fecha_emision: Option<RawValue>,
    pub fecha_vencimiento: Option<RawValue>,
    pub descripcion: Option<RawValue>,
    pub moneda: Option<RawValue>,
    pub base: Option<RawValue>,
    pub impuestos: Option<RawValue>,
    pub total: Option<RawValue>,
    pub cufe: Option<RawValue>,
}

impl RawExtraction {
    /// True when no field was extracted at all.
    pub fn is_empty(&self) -> bool {
        [
            &self.proveedor,
            &self.nit,
            &self.direccion,
            &self.telefono,
            &self.ciudad,
            &self.factura_numero,
            &self.fecha,
            &self.fecha_emision,
            &self.fecha_vencimiento,
            &self.descripcion,
            &self.moneda,
            &self.base,
            &self.impuestos,
            &self.total,
            &self.cufe,
        ]
        .iter()
        .all(|f| f.is_none())
    }
}

impl From<&InvoiceRecord> for RawExtraction {
    /// Rebuild a raw extraction from a stored record so it can be normalized again.
    fn from(record: &InvoiceRecord) -> Self {
        let text = |v: &Option<String>| v.clone().map(RawValue::Text);
        let date = |v: &str| (!v.is_empty()).then(|| RawValue::Text(v.to_string()));
        let nit = match (&record.nit, &record.nit_dv_extraido) {
            (Some(number), Some(dv)) => Some(RawValue::Text(format!("{}-{}", number, dv))),
            (nit, _) => text(nit),
        };

        Self {
            proveedor: text(&record.proveedor),
            nit,
            direccion: text(&record.direccion),
            telefono: text(&record.telefono),
            ciudad: text(&record.ciudad),
            factura_numero: text(&record.factura_numero),
            fecha: date(&record.fecha),
            fecha_emision: None,
            fecha_vencimiento: date(&record.fecha_vencimiento),
            descripcion: text(&record.descripcion),
            moneda: text(&record.moneda),
            base: record.base.map(RawValue::Number),
            impuestos: record.impuestos.map(RawValue::Number),
            total: record.total.map(RawValue::Number),
            cufe: text(&record.cufe),
        }
    }
}

/// Outcome status of a processed document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Estado {
    /// Extracted by the remote vision service.
    #[serde(rename = "EXITOSO")]
    Exitoso,
    /// Extracted from the structured XML companion.
    #[serde(rename = "EXITOSO (XML)")]
    ExitosoXml,
    /// Extraction failed; see `nota`.
    #[default]
    #[serde(rename = "FALLIDO")]
    Fallido,
}

impl Estado {
    /// Whether documents with this status are skipped on later runs.
    pub fn is_success(&self) -> bool {
        matches!(self, Estado::Exitoso | Estado::ExitosoXml)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Estado::Exitoso => "EXITOSO",
            Estado::ExitosoXml => "EXITOSO (XML)",
            Estado::Fallido => "FALLIDO",
        }
    }
}

impl fmt::Display for Estado {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical field values produced by normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedInvoice {
    pub proveedor: Option<String>,
    /// Digits of the tax id without the check digit.
    pub nit: Option<String>,
    pub factura_numero: Option<String>,
    /// `DD/MM/YYYY` or empty.
    pub fecha: String,
    /// `DD/MM/YYYY` or empty.
    pub fecha_vencimiento: String,
    pub descripcion: Option<String>,
    pub moneda: Option<String>,
    pub base: f64,
    pub impuestos: f64,
    pub total: f64,
    pub direccion: Option<String>,
    pub telefono: Option<String>,
    pub ciudad: Option<String>,
    pub cufe: Option<String>,
    /// Check digit recomputed from `nit`, or `"?"` when it cannot be computed.
    pub nit_dv_calculado: String,
    /// Check digit as written in the source, when separated by a hyphen.
    pub nit_dv_extraido: Option<String>,
}

/// One persisted row. Field order is the column order of the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceRecord {
    /// Document basename; identity key of the store.
    pub archivo: String,
    pub estado: Estado,
    pub proveedor: Option<String>,
    pub nit: Option<String>,
    pub factura_numero: Option<String>,
    pub fecha: String,
    pub fecha_vencimiento: String,
    pub descripcion: Option<String>,
    pub moneda: Option<String>,
    pub base: Option<f64>,
    pub impuestos: Option<f64>,
    pub total: Option<f64>,
    pub direccion: Option<String>,
    pub telefono: Option<String>,
    pub ciudad: Option<String>,
    pub cufe: Option<String>,
    pub nit_dv_calculado: Option<String>,
    pub nit_dv_extraido: Option<String>,
    /// Failure detail, only set when `estado` is `FALLIDO`.
    pub nota: Option<String>,
}

/// Column order of the persisted store.
pub const COLUMNS: [&str; 19] = [
    "archivo",
    "estado",
    "proveedor",
    "nit",
    "factura_numero",
    "fecha",
    "fecha_vencimiento",
    "descripcion",
    "moneda",
    "base",
    "impuestos",
    "total",
    "direccion",
    "telefono",
    "ciudad",
    "cufe",
    "nit_dv_calculado",
    "nit_dv_extraido",
    "nota",
];

impl InvoiceRecord {
    /// Build a successful record from normalized fields.
    pub fn success(archivo: impl Into<String>, estado: Estado, fields: NormalizedInvoice) -> Self {
        Self {
            archivo: archivo.into(),
            estado,
            proveedor: fields.proveedor,
            nit: fields.nit,
            factura_numero: fields.factura_numero,
            fecha: fields.fecha,
            fecha_vencimiento: fields.fecha_vencimiento,
            descripcion: fields.descripcion,
            moneda: fields.moneda,
            base: Some(fields.base),
            impuestos: Some(fields.impuestos),
            total: Some(fields.total),
            direccion: fields.direccion,
            telefono: fields.telefono,
            ciudad: fields.ciudad,
            cufe: fields.cufe,
            nit_dv_calculado: Some(fields.nit_dv_calculado),
            nit_dv_extraido: fields.nit_dv_extraido,
            nota: None,
        }
    }

    /// Build a failed record carrying the failure detail.
    pub fn failed(archivo: impl Into<String>, nota: impl Into<String>) -> Self {
        Self {
            archivo: archivo.into(),
            estado: Estado::Fallido,
            nota: Some(nota.into()),
            ..Default::default()
        }
    }

    /// Number of populated columns, used to pick the best row among duplicates.
    pub fn filled_fields(&self) -> usize {
        let text = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        let texts = [
            &self.proveedor,
            &self.nit,
            &self.factura_numero,
            &self.descripcion,
            &self.moneda,
            &self.direccion,
            &self.telefono,
            &self.ciudad,
            &self.cufe,
            &self.nit_dv_calculado,
            &self.nit_dv_extraido,
            &self.nota,
        ];
        let amounts = [self.base, self.impuestos, self.total];

        usize::from(!self.archivo.is_empty())
            + 1
            + texts.iter().filter(|v| text(v)).count()
            + usize::from(!self.fecha.is_empty())
            + usize::from(!self.fecha_vencimiento.is_empty())
            + amounts.iter().filter(|v| v.is_some()).count()
    }
}

/// An input document discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Full path to the image or PDF.
    pub path: PathBuf,
    /// Basename, used as the record identity.
    pub archivo: String,
}

impl Document {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let archivo = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, archivo }
    }

    /// Candidate paths for the structured companion: same stem, XML extension.
    pub fn companion_candidates(&self) -> [PathBuf; 2] {
        [self.path.with_extension("xml"), self.path.with_extension("XML")]
    }

    /// First existing structured companion, if any.
    pub fn companion(&self) -> Option<PathBuf> {
        self.companion_candidates()
            .into_iter()
            .find(|p| Path::new(p).is_file())
    }
}
