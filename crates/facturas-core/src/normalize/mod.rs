//! Normalization rules turning raw extracted values into canonical fields.
//!
//! All operations are total: malformed input degrades to a safe default
//! (0.0, an empty string, or the `"?"` check digit sentinel) instead of failing.

pub mod amounts;
pub mod dates;
pub mod nit;
pub mod patterns;

pub use amounts::{correct_implausible_amount, format_colombian_amount, parse_amount, parse_colombian_amount};
pub use dates::{canonicalize_date, canonicalize_date_str};
pub use nit::{check_digit, check_digit_or_unknown, clean_identifier, split_identifier, validate_nit, UNKNOWN_CHECK_DIGIT};

use crate::models::config::NormalizeConfig;
use crate::models::{NormalizedInvoice, RawExtraction, RawValue};

/// Applies the normalization rules to a raw extraction.
#[derive(Debug, Clone)]
pub struct Normalizer {
    implausible_threshold: f64,
    implausible_multiplier: f64,
}

impl Normalizer {
    /// Create a normalizer with the default thresholds.
    pub fn new() -> Self {
        Self::from_config(&NormalizeConfig::default())
    }

    pub fn from_config(config: &NormalizeConfig) -> Self {
        Self {
            implausible_threshold: config.implausible_threshold,
            implausible_multiplier: config.implausible_multiplier,
        }
    }

    /// Set the threshold below which positive totals are scaled up.
    pub fn with_implausible_threshold(mut self, threshold: f64) -> Self {
        self.implausible_threshold = threshold;
        self
    }

    /// Normalize a raw extraction into canonical fields.
    pub fn normalize(&self, raw: &RawExtraction) -> NormalizedInvoice {
        let fecha = raw.fecha.as_ref().or(raw.fecha_emision.as_ref());

        let base = parse_amount(raw.base.as_ref()).abs();
        let impuestos = parse_amount(raw.impuestos.as_ref()).abs();
        let total = correct_implausible_amount(
            parse_amount(raw.total.as_ref()).abs(),
            self.implausible_threshold,
            self.implausible_multiplier,
        );

        let clean_nit = clean_identifier(raw.nit.as_ref());
        let (number, nit_dv_extraido) = split_identifier(&clean_nit);
        let nit_dv_calculado = check_digit_or_unknown(&number);

        NormalizedInvoice {
            proveedor: text(raw.proveedor.as_ref()),
            nit: (!number.is_empty()).then_some(number),
            factura_numero: text(raw.factura_numero.as_ref()),
            fecha: canonicalize_date(fecha),
            fecha_vencimiento: canonicalize_date(raw.fecha_vencimiento.as_ref()),
            descripcion: text(raw.descripcion.as_ref()),
            moneda: text(raw.moneda.as_ref()),
            base,
            impuestos,
            total,
            direccion: text(raw.direccion.as_ref()),
            telefono: text(raw.telefono.as_ref()),
            ciudad: text(raw.ciudad.as_ref()),
            cufe: text(raw.cufe.as_ref()),
            nit_dv_calculado,
            nit_dv_extraido,
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize with the default rules.
pub fn normalize(raw: &RawExtraction) -> NormalizedInvoice {
    Normalizer::new().normalize(raw)
}

fn text(value: Option<&RawValue>) -> Option<String> {
    value.map(RawValue::as_text).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Estado, InvoiceRecord};
    use pretty_assertions::assert_eq;

    fn sample_raw() -> RawExtraction {
        RawExtraction {
            proveedor: Some(RawValue::from("Distribuidora Andina S.A.S.")),
            nit: Some(RawValue::from("890.903.938-8")),
            factura_numero: Some(RawValue::from("FE-1042")),
            fecha_emision: Some(RawValue::from("2026-02-11")),
            fecha_vencimiento: Some(RawValue::from("2026-03-13")),
            moneda: Some(RawValue::from("COP")),
            base: Some(RawValue::from("33.613,45")),
            impuestos: Some(RawValue::from("6.386,55")),
            total: Some(RawValue::from("40.000")),
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_sample() {
        let n = normalize(&sample_raw());

        assert_eq!(n.fecha, "11/02/2026");
        assert_eq!(n.fecha_vencimiento, "13/03/2026");
        assert_eq!(n.base, 33613.45);
        assert_eq!(n.impuestos, 6386.55);
        assert_eq!(n.total, 40000.0);
        assert_eq!(n.nit.as_deref(), Some("890903938"));
        assert_eq!(n.nit_dv_extraido.as_deref(), Some("8"));
        assert_eq!(n.nit_dv_calculado, "8");
        assert_eq!(n.proveedor.as_deref(), Some("Distribuidora Andina S.A.S."));
    }

    #[test]
    fn test_fecha_takes_precedence_over_fecha_emision() {
        let raw = RawExtraction {
            fecha: Some(RawValue::from("01/02/2026")),
            fecha_emision: Some(RawValue::from("2025-12-31")),
            ..Default::default()
        };
        assert_eq!(normalize(&raw).fecha, "01/02/2026");
    }

    #[test]
    fn test_implausible_total_corrected() {
        let raw = RawExtraction {
            total: Some(RawValue::Number(6.8)),
            ..Default::default()
        };
        assert_eq!(normalize(&raw).total, 6800.0);

        let strict = Normalizer::new().with_implausible_threshold(1.0);
        assert_eq!(strict.normalize(&raw).total, 6.8);
    }

    #[test]
    fn test_negative_amounts_are_non_negative() {
        let raw = RawExtraction {
            total: Some(RawValue::from("-50.000")),
            ..Default::default()
        };
        assert_eq!(normalize(&raw).total, 50000.0);
    }

    #[test]
    fn test_check_digit_always_recomputed() {
        let raw = RawExtraction {
            nit: Some(RawValue::from("800.220.154-9")),
            ..Default::default()
        };
        let n = normalize(&raw);
        assert_eq!(n.nit_dv_extraido.as_deref(), Some("9"));
        assert_eq!(n.nit_dv_calculado, "1");

        let raw = RawExtraction {
            nit: Some(RawValue::from("CC 80.220.154")),
            ..Default::default()
        };
        assert_eq!(normalize(&raw).nit_dv_calculado, UNKNOWN_CHECK_DIGIT);

        assert_eq!(normalize(&RawExtraction::default()).nit_dv_calculado, UNKNOWN_CHECK_DIGIT);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let first = InvoiceRecord::success("a.pdf", Estado::Exitoso, normalize(&sample_raw()));
        let again = InvoiceRecord::success(
            "a.pdf",
            Estado::Exitoso,
            normalize(&RawExtraction::from(&first)),
        );
        assert_eq!(again, first);
    }

    #[test]
    fn test_blank_text_is_absent() {
        let raw = RawExtraction {
            ciudad: Some(RawValue::from("   ")),
            ..Default::default()
        };
        assert_eq!(normalize(&raw).ciudad, None);
    }
}
