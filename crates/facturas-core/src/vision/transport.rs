//! Transport seam between the vision extractor and the remote service.

use async_trait::async_trait;

use crate::error::VisionError;

/// Processing state of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Processing,
    Active,
    Failed,
}

impl FileState {
    /// Map the service's state name. Unknown names are treated as still processing.
    pub fn from_api(state: &str) -> Self {
        match state {
            "ACTIVE" => FileState::Active,
            "FAILED" => FileState::Failed,
            _ => FileState::Processing,
        }
    }
}

/// Handle to a document uploaded to the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Resource name used for status polling (e.g. `files/abc123`).
    pub name: String,
    /// URI referenced by generation requests.
    pub uri: String,
    pub mime_type: String,
    pub state: FileState,
    /// Error message reported with a failed state.
    pub error: Option<String>,
}

/// Remote multimodal model operations used by [`super::VisionExtractor`].
#[async_trait]
pub trait VisionTransport: Send + Sync {
    /// Upload a document and return its initial handle.
    async fn upload(
        &self,
        bytes: Vec<u8>,
        mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteFile, VisionError>;

    /// Refresh the handle of an uploaded document.
    async fn file_status(&self, name: &str) -> Result<RemoteFile, VisionError>;

    /// Ask the model about an uploaded document and return its reply text.
    async fn generate(&self, file: &RemoteFile, prompt: &str) -> Result<String, VisionError>;
}
