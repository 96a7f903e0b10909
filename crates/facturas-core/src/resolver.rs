//! Per-document extraction controller.
//!
//! A document's structured companion is always preferred; the remote vision
//! extractor is only consulted when the companion is missing or yields no
//! invoice. The resolver never fails: every outcome becomes an
//! [`InvoiceRecord`], with `FALLIDO` and a note for failures.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::models::{Document, Estado, InvoiceRecord, RawExtraction};
use crate::normalize::Normalizer;
use crate::structured::StructuredExtractor;
use crate::vision::{to_raw_extraction, VisionExtractor};

/// Note recorded when the remote model answered with nothing usable.
pub const NO_DATA_NOTE: &str = "no parseable data";

pub struct ExtractionResolver {
    structured: StructuredExtractor,
    normalizer: Normalizer,
    vision: Arc<VisionExtractor>,
}

impl ExtractionResolver {
    pub fn new(vision: Arc<VisionExtractor>) -> Self {
        Self {
            structured: StructuredExtractor::new(),
            normalizer: Normalizer::new(),
            vision,
        }
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Resolve one document into a record.
    pub async fn resolve(&self, document: &Document) -> InvoiceRecord {
        if let Some(raw) = self.try_structured(document).await {
            info!("{}: extracted from XML companion", document.archivo);
            return self.record(document, Estado::ExitosoXml, &raw);
        }

        match self.vision.extract(&document.path).await {
            Ok(Some(reply)) => {
                info!("{}: extracted remotely", document.archivo);
                self.record(document, Estado::Exitoso, &to_raw_extraction(&reply))
            }
            Ok(None) => {
                warn!("{}: {}", document.archivo, NO_DATA_NOTE);
                InvoiceRecord::failed(&document.archivo, NO_DATA_NOTE)
            }
            Err(err) => {
                warn!("{}: remote extraction failed: {}", document.archivo, err);
                InvoiceRecord::failed(&document.archivo, err.to_string())
            }
        }
    }

    /// Parse the structured companion on a blocking thread.
    async fn try_structured(&self, document: &Document) -> Option<RawExtraction> {
        let document = document.clone();
        let extractor = self.structured.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            document.companion().map(|companion| extractor.extract(&companion))
        })
        .await;

        match outcome {
            Ok(Some(Ok(raw))) => Some(raw),
            Ok(Some(Err(err))) => {
                warn!("XML companion unusable, falling back to remote extraction: {}", err);
                None
            }
            Ok(None) => {
                debug!("No XML companion");
                None
            }
            Err(err) => {
                warn!("XML parsing task failed: {}", err);
                None
            }
        }
    }

    fn record(&self, document: &Document, estado: Estado, raw: &RawExtraction) -> InvoiceRecord {
        InvoiceRecord::success(&document.archivo, estado, self.normalizer.normalize(raw))
    }
}
