//! Error types for the facturas-core library.

use thiserror::Error;

/// Main error type for the facturas library.
#[derive(Error, Debug)]
pub enum FacturasError {
    /// Local extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Remote vision service error.
    #[error("vision error: {0}")]
    Vision(#[from] VisionError),

    /// Persisted store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised by the local extraction and normalization rules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// Structured companion missing or unparsable. Triggers the vision fallback.
    #[error("no structured data: {0}")]
    NoStructuredData(String),

    /// Tax identifier is empty, non-numeric or longer than 15 digits.
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),
}

/// Errors related to the remote vision extraction service.
#[derive(Error, Debug)]
pub enum VisionError {
    /// The service reported a terminal failure state for the document.
    #[error("remote extraction failed: {0}")]
    ExtractionFailed(String),

    /// The service is throttling requests.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The document never left the processing state.
    #[error("document still processing after {0} polls")]
    PollTimeout(u32),

    /// Non-success HTTP response that is not a rate-limit signal.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Connection, timeout or decoding failure.
    #[error("network error: {0}")]
    Network(String),

    /// No API key configured.
    #[error("missing API key (set GOOGLE_API_KEY)")]
    MissingApiKey,

    /// Failed to read the document.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VisionError {
    /// Whether this error should be retried with backoff.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, VisionError::RateLimited(_))
    }
}

impl From<reqwest::Error> for VisionError {
    fn from(err: reqwest::Error) -> Self {
        if err.status().map(|s| s.as_u16()) == Some(429) {
            VisionError::RateLimited(err.to_string())
        } else {
            VisionError::Network(err.to_string())
        }
    }
}

/// Errors related to the persisted CSV store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// CSV encoding or decoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The checkpoint consumer stopped before draining its queue.
    #[error("checkpoint task failed: {0}")]
    Checkpoint(String),
}

/// Result type for the facturas library.
pub type Result<T> = std::result::Result<T, FacturasError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VisionError::PollTimeout(60);
        assert_eq!(err.to_string(), "document still processing after 60 polls");

        let err = ExtractionError::InvalidIdentifier("12a".to_string());
        assert!(err.to_string().contains("12a"));
    }

    #[test]
    fn test_rate_limited_classification() {
        assert!(VisionError::RateLimited("429".into()).is_rate_limited());
        assert!(!VisionError::ExtractionFailed("boom".into()).is_rate_limited());
        assert!(!VisionError::Http { status: 400, body: "INVALID_ARGUMENT".into() }.is_rate_limited());
    }
}
