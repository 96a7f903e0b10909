//! Structured extraction from UBL 2.1 XML invoices (DIAN Colombia standard).
//!
//! Electronic invoices usually arrive as an `AttachedDocument` envelope whose
//! `Description` element carries the real `Invoice` as escaped text or CDATA.
//! Plain `Invoice` documents are accepted as well.

mod tree;

pub use tree::Element;

use std::path::Path;

use tracing::debug;

use crate::error::ExtractionError;
use crate::models::{RawExtraction, RawValue};

/// Result type for structured extraction.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Path to the embedded invoice inside an `AttachedDocument` envelope.
const ENVELOPE_PAYLOAD: &str = ".//Attachment/ExternalReference/Description";

/// Description used when the invoice has no line item description.
pub const DEFAULT_DESCRIPTION: &str = "Factura de Venta";

const SUPPLIER_NAME: &str = ".//AccountingSupplierParty/Party/PartyTaxScheme/RegistrationName";
const SUPPLIER_NIT: &str = ".//AccountingSupplierParty/Party/PartyTaxScheme/CompanyID";
const SUPPLIER_ADDRESS: &str =
    ".//AccountingSupplierParty/Party/PhysicalLocation/Address/AddressLine/Line";
const SUPPLIER_PHONE: &str = ".//AccountingSupplierParty/Party/Contact/Telephone";
const SUPPLIER_CITY: &str = ".//AccountingSupplierParty/Party/PhysicalLocation/Address/CityName";
const INVOICE_ID: &str = "./ID";
const ISSUE_DATE: &str = ".//IssueDate";
const DUE_DATE: &str = ".//DueDate";
const LINE_DESCRIPTION: &str = ".//InvoiceLine/Item/Description";
const CURRENCY: &str = "./DocumentCurrencyCode";
const TAX_EXCLUSIVE: &str = ".//LegalMonetaryTotal/TaxExclusiveAmount";
const TAX_AMOUNT: &str = ".//TaxTotal/TaxAmount";
const PAYABLE: &str = ".//LegalMonetaryTotal/PayableAmount";
const CUFE: &str = "./UUID";

/// Extracts invoice fields from a structured XML companion.
#[derive(Debug, Clone, Default)]
pub struct StructuredExtractor;

impl StructuredExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract fields from an XML file.
    ///
    /// Every way of not finding an invoice is reported as
    /// [`ExtractionError::NoStructuredData`].
    pub fn extract(&self, path: &Path) -> Result<RawExtraction> {
        let bytes = std::fs::read(path).map_err(|e| {
            ExtractionError::NoStructuredData(format!("cannot read {}: {}", path.display(), e))
        })?;
        let xml = String::from_utf8_lossy(&bytes);
        self.extract_str(&xml)
    }

    /// Extract fields from XML text.
    pub fn extract_str(&self, xml: &str) -> Result<RawExtraction> {
        let root = Element::parse(xml.trim_start_matches('\u{feff}'))?;

        if root.name.ends_with("AttachedDocument") {
            let payload = root.find_text(ENVELOPE_PAYLOAD).ok_or_else(|| {
                ExtractionError::NoStructuredData("envelope has no embedded invoice".to_string())
            })?;
            let inner = Element::parse(&payload)?;
            debug!("Parsed embedded <{}> from envelope", inner.name);
            return Ok(self.parse_invoice(&inner));
        }

        if root.name.ends_with("Invoice") {
            return Ok(self.parse_invoice(&root));
        }

        Err(ExtractionError::NoStructuredData(format!(
            "unsupported root element <{}>",
            root.name
        )))
    }

    fn parse_invoice(&self, root: &Element) -> RawExtraction {
        let text = |path: &str| root.find_text(path).map(RawValue::Text);

        RawExtraction {
            proveedor: text(SUPPLIER_NAME),
            nit: text(SUPPLIER_NIT),
            direccion: text(SUPPLIER_ADDRESS),
            telefono: text(SUPPLIER_PHONE),
            ciudad: text(SUPPLIER_CITY),
            factura_numero: text(INVOICE_ID),
            fecha: None,
            fecha_emision: text(ISSUE_DATE),
            fecha_vencimiento: text(DUE_DATE),
            descripcion: Some(
                text(LINE_DESCRIPTION).unwrap_or_else(|| RawValue::from(DEFAULT_DESCRIPTION)),
            ),
            moneda: text(CURRENCY),
            base: Some(number(root, TAX_EXCLUSIVE)),
            impuestos: Some(number(root, TAX_AMOUNT)),
            total: Some(number(root, PAYABLE)),
            cufe: text(CUFE),
        }
    }
}

/// Numeric lookup; missing or unparsable values are 0.0.
fn number(root: &Element, path: &str) -> RawValue {
    let value = root
        .find_text(path)
        .and_then(|t| t.parse::<f64>().ok())
        .unwrap_or(0.0);
    RawValue::Number(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const INVOICE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Invoice xmlns="urn:oasis:names:specification:ubl:schema:xsd:Invoice-2"
         xmlns:cac="urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2"
         xmlns:cbc="urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2">
  <cbc:UUID schemeName="CUFE-SHA384">a1b2c3d4e5</cbc:UUID>
  <cbc:ID>SETP990000002</cbc:ID>
  <cbc:IssueDate>2026-02-11</cbc:IssueDate>
  <cbc:DueDate>2026-03-13</cbc:DueDate>
  <cbc:DocumentCurrencyCode>COP</cbc:DocumentCurrencyCode>
  <cac:AccountingSupplierParty>
    <cac:Party>
      <cac:PhysicalLocation>
        <cac:Address>
          <cbc:CityName>Medellín</cbc:CityName>
          <cac:AddressLine><cbc:Line>Cra 43A # 1-50</cbc:Line></cac:AddressLine>
        </cac:Address>
      </cac:PhysicalLocation>
      <cac:PartyTaxScheme>
        <cbc:RegistrationName>Almacenes Éxito S.A.</cbc:RegistrationName>
        <cbc:CompanyID schemeID="8">890900608</cbc:CompanyID>
      </cac:PartyTaxScheme>
      <cac:Contact><cbc:Telephone>6043396565</cbc:Telephone></cac:Contact>
    </cac:Party>
  </cac:AccountingSupplierParty>
  <cac:TaxTotal><cbc:TaxAmount currencyID="COP">6386.55</cbc:TaxAmount></cac:TaxTotal>
  <cac:LegalMonetaryTotal>
    <cbc:TaxExclusiveAmount currencyID="COP">33613.45</cbc:TaxExclusiveAmount>
    <cbc:PayableAmount currencyID="COP">40000.00</cbc:PayableAmount>
  </cac:LegalMonetaryTotal>
  <cac:InvoiceLine>
    <cbc:ID>1</cbc:ID>
    <cac:Item><cbc:Description>Resma papel carta</cbc:Description></cac:Item>
  </cac:InvoiceLine>
</Invoice>"#;

    fn envelope(payload: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<AttachedDocument xmlns="urn:oasis:names:specification:ubl:schema:xsd:AttachedDocument-2"
                  xmlns:cac="urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2"
                  xmlns:cbc="urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2">
  <cbc:ID>AD-1</cbc:ID>
  <cac:Attachment>
    <cac:ExternalReference>
      <cbc:MimeCode>text/xml</cbc:MimeCode>
      <cbc:Description><![CDATA[{}]]></cbc:Description>
    </cac:ExternalReference>
  </cac:Attachment>
</AttachedDocument>"#,
            payload
        )
    }

    #[test]
    fn test_direct_invoice() {
        let raw = StructuredExtractor::new().extract_str(INVOICE).unwrap();

        assert_eq!(raw.proveedor, Some(RawValue::from("Almacenes Éxito S.A.")));
        assert_eq!(raw.nit, Some(RawValue::from("890900608")));
        assert_eq!(raw.ciudad, Some(RawValue::from("Medellín")));
        assert_eq!(raw.direccion, Some(RawValue::from("Cra 43A # 1-50")));
        assert_eq!(raw.telefono, Some(RawValue::from("6043396565")));
        assert_eq!(raw.factura_numero, Some(RawValue::from("SETP990000002")));
        assert_eq!(raw.fecha_emision, Some(RawValue::from("2026-02-11")));
        assert_eq!(raw.fecha_vencimiento, Some(RawValue::from("2026-03-13")));
        assert_eq!(raw.descripcion, Some(RawValue::from("Resma papel carta")));
        assert_eq!(raw.moneda, Some(RawValue::from("COP")));
        assert_eq!(raw.base, Some(RawValue::Number(33613.45)));
        assert_eq!(raw.impuestos, Some(RawValue::Number(6386.55)));
        assert_eq!(raw.total, Some(RawValue::Number(40000.0)));
        assert_eq!(raw.cufe, Some(RawValue::from("a1b2c3d4e5")));
    }

    #[test]
    fn test_cdata_envelope() {
        let raw = StructuredExtractor::new()
            .extract_str(&envelope(INVOICE))
            .unwrap();
        assert_eq!(raw.factura_numero, Some(RawValue::from("SETP990000002")));
        assert_eq!(raw.total, Some(RawValue::Number(40000.0)));
    }

    #[test]
    fn test_escaped_envelope() {
        let escaped = INVOICE
            .replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;");
        let xml = envelope("").replace("<![CDATA[]]>", &escaped);

        let raw = StructuredExtractor::new().extract_str(&xml).unwrap();
        assert_eq!(raw.nit, Some(RawValue::from("890900608")));
    }

    #[test]
    fn test_missing_fields_default() {
        let raw = StructuredExtractor::new()
            .extract_str("<Invoice><ID>X-1</ID><LegalMonetaryTotal><PayableAmount>abc</PayableAmount></LegalMonetaryTotal></Invoice>")
            .unwrap();

        assert_eq!(raw.descripcion, Some(RawValue::from(DEFAULT_DESCRIPTION)));
        assert_eq!(raw.base, Some(RawValue::Number(0.0)));
        assert_eq!(raw.total, Some(RawValue::Number(0.0)));
        assert_eq!(raw.proveedor, None);
        assert_eq!(raw.cufe, None);
    }

    #[test]
    fn test_no_structured_data() {
        let extractor = StructuredExtractor::new();

        let err = extractor.extract_str("<ApplicationResponse/>").unwrap_err();
        assert!(matches!(err, ExtractionError::NoStructuredData(_)));

        assert!(extractor.extract_str("<Invoice><ID>").is_err());
        assert!(extractor.extract_str(&envelope("<Invoice><broken")).is_err());
        assert!(extractor.extract(Path::new("/nonexistent/file.xml")).is_err());
    }

    #[test]
    fn test_extract_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("FE-1.xml");
        std::fs::write(&path, envelope(INVOICE)).unwrap();

        let raw = StructuredExtractor::new().extract(&path).unwrap();
        assert_eq!(raw.cufe, Some(RawValue::from("a1b2c3d4e5")));
    }
}
