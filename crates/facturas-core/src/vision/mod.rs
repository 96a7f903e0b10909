//! Fallback extraction through a remote multimodal model.
//!
//! A document is uploaded, polled until the service finishes processing it,
//! and then submitted with [`EXTRACTION_PROMPT`]. The reply is parsed by
//! [`reply::parse_reply`]; rate-limited generation requests are retried by
//! a [`RetryPolicy`].

pub mod gemini;
pub mod reply;
pub mod retry;
pub mod transport;

pub use gemini::GeminiTransport;
pub use reply::{parse_reply, to_raw_extraction, ParsedReply};
pub use retry::RetryPolicy;
pub use transport::{FileState, RemoteFile, VisionTransport};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::VisionError;
use crate::models::FacturasConfig;

/// Instruction sent with every document. Asks for the fixed reply vocabulary
/// mapped by [`reply::to_raw_extraction`].
pub const EXTRACTION_PROMPT: &str = "\
Eres un asistente administrativo experto y meticuloso. Analiza este documento (factura/recibo).
Tu objetivo es extraer la mayor cantidad de información posible.

Extrae los siguientes datos en formato JSON estrictamente válido.

Campos requeridos (usa null si no encuentras el valor):
- proveedor_nombre (string): Nombre legal del emisor.
- proveedor_nit (string): NIT, RUT, CUIT o identificación fiscal del emisor.
- proveedor_direccion (string): Dirección física.
- proveedor_telefono (string): Teléfono de contacto.
- proveedor_ciudad (string): Ciudad del emisor.
- factura_numero (string): Número consecutivo de la factura.
- fecha_emision (string): Fecha de la factura (YYYY-MM-DD).
- fecha_vencimiento (string): Fecha de pago/vencimiento (YYYY-MM-DD).
- descripcion_general (string): Resumen breve de qué se está cobrando.
- moneda (string): COP, USD, EUR, etc.
- base_imponible (float): Subtotal antes de impuestos.
- impuestos (float): Valor total de IVA u otros impuestos.
- total (float): Valor total a pagar.
- cufe (string): CUFE o CUDE (Código Único de Facturación Electrónica).

Devuelve SOLO el objeto JSON, nada de markdown ni explicaciones.";

/// Media type sent with the upload, derived from the file extension.
pub fn media_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Remote extraction driver over a [`VisionTransport`].
pub struct VisionExtractor {
    transport: Arc<dyn VisionTransport>,
    retry: RetryPolicy,
    poll_interval: Duration,
    max_polls: u32,
}

impl VisionExtractor {
    pub fn new(transport: Arc<dyn VisionTransport>) -> Self {
        Self::from_config(transport, &FacturasConfig::default())
    }

    pub fn from_config(transport: Arc<dyn VisionTransport>, config: &FacturasConfig) -> Self {
        Self {
            transport,
            retry: RetryPolicy::from_config(&config.retry),
            poll_interval: config.vision.poll_interval(),
            max_polls: config.vision.max_polls,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    /// Extract the reply field map for a document.
    ///
    /// Returns `Ok(None)` when the model answered with nothing usable.
    pub async fn extract(&self, path: &Path) -> Result<Option<Map<String, Value>>, VisionError> {
        let bytes = tokio::fs::read(path).await?;
        let mime_type = media_type(path);
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        info!("Uploading {} for remote extraction", display_name);
        let uploaded = self.transport.upload(bytes, mime_type, &display_name).await?;
        let file = self.wait_until_ready(uploaded).await?;

        debug!("Generating extraction for {}", display_name);
        let transport = &self.transport;
        let file = &file;
        let text = self
            .retry
            .run(|| async move { transport.generate(file, EXTRACTION_PROMPT).await })
            .await?;

        match parse_reply(&text) {
            ParsedReply::Fields(fields) => Ok(Some(fields)),
            ParsedReply::Empty => {
                warn!("Empty reply for {}", display_name);
                Ok(None)
            }
            ParsedReply::Unparsable => {
                let preview: String = text.chars().take(100).collect();
                warn!("Unparsable reply for {}: {}...", display_name, preview);
                Ok(None)
            }
        }
    }

    async fn wait_until_ready(&self, mut file: RemoteFile) -> Result<RemoteFile, VisionError> {
        let mut polls = 0;
        while file.state == FileState::Processing {
            if polls >= self.max_polls {
                return Err(VisionError::PollTimeout(polls));
            }
            debug!("Processing {} remotely", file.name);
            tokio::time::sleep(self.poll_interval).await;
            file = self.transport.file_status(&file.name).await?;
            polls += 1;
        }

        if file.state == FileState::Failed {
            let message = file
                .error
                .take()
                .unwrap_or_else(|| "remote file processing failed".to_string());
            return Err(VisionError::ExtractionFailed(message));
        }
        Ok(file)
    }
}
