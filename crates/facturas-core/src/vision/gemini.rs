//! Gemini File API + generateContent transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::transport::{FileState, RemoteFile, VisionTransport};
use crate::error::VisionError;
use crate::models::config::VisionConfig;

/// Environment variables checked for the API key, in order.
pub const API_KEY_VARS: [&str; 2] = ["GOOGLE_API_KEY", "GEMINI_API_KEY"];

const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiTransport {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl GeminiTransport {
    pub fn new(api_key: impl Into<String>, config: &VisionConfig) -> Result<Self, VisionError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(VisionError::MissingApiKey);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    /// Build a transport from the first non-empty key in [`API_KEY_VARS`].
    pub fn from_env(config: &VisionConfig) -> Result<Self, VisionError> {
        let key = API_KEY_VARS
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|value| !value.trim().is_empty())
            .ok_or(VisionError::MissingApiKey)?;
        Self::new(key, config)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl VisionTransport for GeminiTransport {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteFile, VisionError> {
        // Resumable protocol: a start request returns the session URL, then
        // the bytes are sent with upload+finalize.
        let start = self
            .client
            .post(format!("{}/upload/v1beta/files", self.api_base))
            .header(API_KEY_HEADER, &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await?;
        let start = check(start).await?;
        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| VisionError::Network("upload session URL missing".into()))?;

        debug!("Uploading {} ({} bytes, {})", display_name, bytes.len(), mime_type);
        let response = self
            .client
            .post(upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await?;
        let envelope: UploadResponse = check(response).await?.json().await?;
        Ok(envelope.file.into())
    }

    async fn file_status(&self, name: &str) -> Result<RemoteFile, VisionError> {
        let response = self
            .client
            .get(format!("{}/v1beta/{}", self.api_base, name))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        let file: ApiFile = check(response).await?.json().await?;
        Ok(file.into())
    }

    async fn generate(&self, file: &RemoteFile, prompt: &str) -> Result<String, VisionError> {
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "file_data": { "mime_type": file.mime_type, "file_uri": file.uri } },
                    { "text": prompt }
                ]
            }],
            "generationConfig": { "responseMimeType": "application/json" }
        });
        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.api_base, self.model
            ))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await?;
        let reply: GenerateResponse = check(response).await?.json().await?;
        Ok(reply.text())
    }
}

/// Turn non-success responses into errors, classifying throttling.
async fn check(response: Response) -> Result<Response, VisionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify(status, body))
}

fn classify(status: StatusCode, body: String) -> VisionError {
    if status == StatusCode::TOO_MANY_REQUESTS || body.contains("RESOURCE_EXHAUSTED") {
        VisionError::RateLimited(body)
    } else {
        VisionError::Http {
            status: status.as_u16(),
            body,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: ApiFile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiFile {
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    error: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    message: String,
}

impl From<ApiFile> for RemoteFile {
    fn from(file: ApiFile) -> Self {
        RemoteFile {
            name: file.name,
            uri: file.uri,
            mime_type: file.mime_type,
            state: FileState::from_api(&file.state),
            error: file.error.map(|status| status.message),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}
