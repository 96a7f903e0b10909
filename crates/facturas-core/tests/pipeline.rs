//! End-to-end runs over a temporary input directory and CSV store.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use facturas_core::vision::{FileState, RemoteFile};
use facturas_core::{
    discovery, CsvStore, Estado, ExtractionResolver, FacturasConfig, Orchestrator, RetryPolicy,
    VisionError, VisionExtractor, VisionTransport,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const ENVELOPE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<AttachedDocument xmlns="urn:oasis:names:specification:ubl:schema:xsd:AttachedDocument-2"
                  xmlns:cac="urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2"
                  xmlns:cbc="urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2">
  <cac:Attachment>
    <cac:ExternalReference>
      <cbc:Description><![CDATA[<?xml version="1.0" encoding="UTF-8"?>
<Invoice xmlns:cac="urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2"
         xmlns:cbc="urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2">
  <cbc:ID>FEV-3310</cbc:ID>
  <cbc:UUID>9f8e7d6c5b4a</cbc:UUID>
  <cbc:IssueDate>2026-01-20</cbc:IssueDate>
  <cbc:DueDate>2026-02-19</cbc:DueDate>
  <cbc:DocumentCurrencyCode>COP</cbc:DocumentCurrencyCode>
  <cac:AccountingSupplierParty>
    <cac:Party>
      <cac:PartyTaxScheme>
        <cbc:RegistrationName>Empresas Públicas de Medellín E.S.P.</cbc:RegistrationName>
        <cbc:CompanyID>890904996</cbc:CompanyID>
      </cac:PartyTaxScheme>
    </cac:Party>
  </cac:AccountingSupplierParty>
  <cac:TaxTotal>
    <cbc:TaxAmount>19000.00</cbc:TaxAmount>
  </cac:TaxTotal>
  <cac:LegalMonetaryTotal>
    <cbc:TaxExclusiveAmount>100000.00</cbc:TaxExclusiveAmount>
    <cbc:PayableAmount>119000.00</cbc:PayableAmount>
  </cac:LegalMonetaryTotal>
  <cac:InvoiceLine>
    <cac:Item>
      <cbc:Description>Servicio de energía</cbc:Description>
    </cac:Item>
  </cac:InvoiceLine>
</Invoice>]]></cbc:Description>
    </cac:ExternalReference>
  </cac:Attachment>
</AttachedDocument>"#;

/// Answers per uploaded file name; files without a scripted reply fail.
#[derive(Default)]
struct FakeGemini {
    replies: Mutex<HashMap<String, String>>,
    uploads: AtomicU32,
}

impl FakeGemini {
    fn reply(self, display_name: &str, text: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(display_name.to_string(), text.to_string());
        self
    }
}

#[async_trait]
impl VisionTransport for FakeGemini {
    async fn upload(
        &self,
        _bytes: Vec<u8>,
        mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteFile, VisionError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(RemoteFile {
            name: display_name.to_string(),
            uri: format!("https://files.test/{display_name}"),
            mime_type: mime_type.to_string(),
            state: FileState::Active,
            error: None,
        })
    }

    async fn file_status(&self, _name: &str) -> Result<RemoteFile, VisionError> {
        Err(VisionError::Network("not expected".into()))
    }

    async fn generate(&self, file: &RemoteFile, _prompt: &str) -> Result<String, VisionError> {
        self.replies
            .lock()
            .unwrap()
            .get(&file.name)
            .cloned()
            .ok_or_else(|| VisionError::Http {
                status: 400,
                body: "Request contains an invalid argument. INVALID_ARGUMENT".into(),
            })
    }
}

fn touch(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

fn orchestrator(transport: Arc<FakeGemini>) -> Orchestrator {
    let config = FacturasConfig::default();
    let vision = VisionExtractor::from_config(transport, &config)
        .with_retry(RetryPolicy::new(3, Duration::ZERO));
    let resolver = ExtractionResolver::new(Arc::new(vision));
    Orchestrator::from_config(Arc::new(resolver), &config.run)
        .with_completion_delay(Duration::ZERO)
        .with_checkpoint_every(2)
}

#[tokio::test]
async fn test_full_run_then_resume() {
    let input = TempDir::new().unwrap();
    touch(input.path(), "epm.pdf", "%PDF");
    touch(input.path(), "epm.xml", ENVELOPE);
    touch(input.path(), "tienda.jpg", "jpeg");
    touch(input.path(), "corrupto.pdf", "%PDF");
    let output = TempDir::new().unwrap();
    let store = CsvStore::new(output.path().join("gastos.csv"));
    let extensions = FacturasConfig::default().input.extensions;

    let transport = Arc::new(FakeGemini::default().reply(
        "tienda.jpg",
        "```json\n{\"proveedor_nombre\": \"Tienda La Esquina\", \"proveedor_nit\": \"800.197.268-4\", \"fecha_emision\": \"2026-01-05\", \"total\": \"12,5\"}\n```",
    ));

    let documents = discovery::discover(input.path(), &extensions);
    assert_eq!(documents.len(), 3);

    let summary = orchestrator(transport.clone())
        .run(documents, &store.skip_set().unwrap(), store.clone(), |_| {})
        .await
        .unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(transport.uploads.load(Ordering::SeqCst), 2);

    let records = store.load().unwrap();
    assert_eq!(records.len(), 3);

    let epm = records.iter().find(|r| r.archivo == "epm.pdf").unwrap();
    assert_eq!(epm.estado, Estado::ExitosoXml);
    assert_eq!(epm.proveedor.as_deref(), Some("Empresas Públicas de Medellín E.S.P."));
    assert_eq!(epm.fecha, "20/01/2026");
    assert_eq!(epm.fecha_vencimiento, "19/02/2026");
    assert_eq!(epm.descripcion.as_deref(), Some("Servicio de energía"));
    assert_eq!(epm.total, Some(119000.0));
    assert_eq!(epm.cufe.as_deref(), Some("9f8e7d6c5b4a"));

    let tienda = records.iter().find(|r| r.archivo == "tienda.jpg").unwrap();
    assert_eq!(tienda.estado, Estado::Exitoso);
    assert_eq!(tienda.nit.as_deref(), Some("800197268"));
    assert_eq!(tienda.nit_dv_calculado.as_deref(), Some("4"));
    assert_eq!(tienda.total, Some(12500.0));

    let corrupto = records.iter().find(|r| r.archivo == "corrupto.pdf").unwrap();
    assert_eq!(corrupto.estado, Estado::Fallido);
    assert!(corrupto.nota.as_deref().unwrap().contains("INVALID_ARGUMENT"));

    // Second run only retries the failure.
    let transport = Arc::new(
        FakeGemini::default().reply("corrupto.pdf", r#"{"proveedor_nombre": "Papelería", "total": 30000}"#),
    );
    let summary = orchestrator(transport.clone())
        .run(
            discovery::discover(input.path(), &extensions),
            &store.skip_set().unwrap(),
            store.clone(),
            |_| {},
        )
        .await
        .unwrap();

    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(transport.uploads.load(Ordering::SeqCst), 1);

    assert_eq!(store.load().unwrap().len(), 4);
    assert_eq!(store.deduplicate_in_place().unwrap(), (4, 3));

    let records = store.load().unwrap();
    let archivos: Vec<&str> = records.iter().map(|r| r.archivo.as_str()).collect();
    assert_eq!(archivos, vec!["corrupto.pdf", "epm.pdf", "tienda.jpg"]);
    assert!(records.iter().all(|r| r.estado.is_success()));
}
