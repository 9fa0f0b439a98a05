//! Gemini backend over the Generative Language REST API.
//!
//! - Single-shot calls use `models/{model}:generateContent`
//! - Streaming calls use `models/{model}:streamGenerateContent?alt=sse`
//! - PDFs are uploaded with the Files API resumable protocol

use crate::backend::{FileUploader, ModelBackend, ModelRequest, TextStream, UploadedFile};
use crate::content::{Part, Turn};
use crate::error::ModelError;
use crate::sse::SseDataStream;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, instrument};

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default model.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Finish and block reasons that mean the output was withheld.
const BLOCKING_REASONS: &[&str] = &[
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
    "OTHER",
];

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Configuration for the Gemini backend.
#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    /// API key.
    pub api_key: String,
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// Base URL for the API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl GeminiConfig {
    /// Creates a configuration with the default model and endpoint.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: default_model(),
            base_url: default_base_url(),
        }
    }

    /// Overrides the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{method}",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    fn upload_endpoint(&self) -> String {
        format!("{}/upload/v1beta/files", self.base_url.trim_end_matches('/'))
    }
}

/// Gemini implementation of [`ModelBackend`] and [`FileUploader`].
#[derive(Debug, Clone)]
pub struct GeminiBackend {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiBackend {
    /// Creates a new backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty.
    pub fn new(http: reqwest::Client, config: GeminiConfig) -> Result<Self, ModelError> {
        if config.api_key.trim().is_empty() {
            return Err(ModelError::InvalidConfig {
                reason: "API key is empty".to_string(),
            });
        }
        Ok(Self { http, config })
    }

    async fn post_content(
        &self,
        url: String,
        request: &ModelRequest,
    ) -> Result<reqwest::Response, ModelError> {
        let body = GenerateContentRequest::from_request(request);
        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&body)
            .send()
            .await?;
        check_status(response).await
    }
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    #[instrument(skip(self, request), fields(model = %self.config.model))]
    async fn generate(&self, request: &ModelRequest) -> Result<String, ModelError> {
        let response = self
            .post_content(self.config.endpoint("generateContent"), request)
            .await?;
        let body: GenerateContentResponse =
            response.json().await.map_err(|e| ModelError::Decode {
                reason: e.to_string(),
            })?;
        body.into_text()
    }

    #[instrument(skip(self, request), fields(model = %self.config.model, history = request.history.len()))]
    async fn generate_stream(&self, request: &ModelRequest) -> Result<TextStream, ModelError> {
        let url = format!("{}?alt=sse", self.config.endpoint("streamGenerateContent"));
        let response = self.post_content(url, request).await?;
        debug!("model stream opened");
        Ok(text_fragments(response.bytes_stream()))
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl FileUploader for GeminiBackend {
    #[instrument(skip(self, path), fields(mime_type = %mime_type))]
    async fn upload(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<UploadedFile, ModelError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ModelError::Upload {
                reason: format!("failed to read {}: {e}", path.display()),
            })?;

        let start = self
            .http
            .post(self.config.upload_endpoint())
            .header(API_KEY_HEADER, &self.config.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&serde_json::json!({ "file": { "display_name": display_name } }))
            .send()
            .await?;
        let start = check_status(start).await?;

        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ModelError::Upload {
                reason: "upload session returned no upload URL".to_string(),
            })?
            .to_string();

        let finished = self
            .http
            .post(upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await?;
        let finished = check_status(finished).await?;

        let uploaded: UploadResponse = finished.json().await.map_err(|e| ModelError::Decode {
            reason: e.to_string(),
        })?;
        debug!(uri = %uploaded.file.uri, "file uploaded");

        Ok(UploadedFile {
            uri: uploaded.file.uri,
            mime_type: uploaded.file.mime_type,
        })
    }
}

/// Turns an SSE byte stream into a stream of text fragments.
///
/// Chunks without text (e.g. a final usage-only chunk) are skipped. A chunk
/// reporting a blocking finish reason yields a [`ModelError::Blocked`].
fn text_fragments<S, E>(bytes: S) -> TextStream
where
    S: Stream<Item = Result<Bytes, E>> + Unpin + Send + 'static,
    E: Into<ModelError> + Send + 'static,
{
    let fragments = SseDataStream::new(bytes).filter_map(|event| async move {
        let data = match event {
            Ok(data) => data,
            Err(e) => return Some(Err(e.into())),
        };
        match serde_json::from_str::<GenerateContentResponse>(&data) {
            Ok(chunk) => match chunk.into_text() {
                Ok(text) if text.is_empty() => None,
                other => Some(other),
            },
            Err(e) => Some(Err(ModelError::Decode {
                reason: e.to_string(),
            })),
        }
    });
    Box::pin(fragments)
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ModelError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ModelError::Api {
        status: status.as_u16(),
        message: api_error_message(&body),
    })
}

/// Extracts `error.message` from an API error body, falling back to the raw
/// body.
fn api_error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }
    #[derive(Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Turn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

impl GenerateContentRequest {
    fn from_request(request: &ModelRequest) -> Self {
        Self {
            contents: request.contents(),
            system_instruction: request
                .system_instruction
                .as_ref()
                .filter(|s| !s.trim().is_empty())
                .map(|s| SystemInstruction {
                    parts: vec![Part::text(s.clone())],
                }),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    fn into_text(self) -> Result<String, ModelError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ModelError::Blocked { reason });
        }

        let Some(candidate) = self.candidates.into_iter().next() else {
            return Ok(String::new());
        };

        if let Some(reason) = candidate
            .finish_reason
            .filter(|r| BLOCKING_REASONS.contains(&r.as_str()))
        {
            return Err(ModelError::Blocked { reason });
        }

        Ok(candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: UploadedFileBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadedFileBody {
    uri: String,
    mime_type: String,
}
