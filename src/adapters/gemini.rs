//! Gemini adapter over the Generative Language REST API.
//!
//! Transcription uploads the recording to the Files API, references it from a
//! `generateContent` call and deletes it afterwards. Extraction is a plain
//! `generateContent` call with a system instruction and JSON output mode.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{AudioInput, GenerationRequest, LanguageModel, ModelError, SpeechModel};

/// Public API endpoint
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const API_VERSION: &str = "v1beta";

/// How many times to poll an uploaded file that is still processing
const MAX_STATE_POLLS: u32 = 10;

const STATE_POLL_INTERVAL: Duration = Duration::from_millis(500);

// ============================================================================
// Gemini API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_data: Option<FileData>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            file_data: None,
        }
    }

    fn file(mime_type: &str, file_uri: &str) -> Self {
        Self {
            text: None,
            file_data: Some(FileData {
                mime_type: mime_type.to_string(),
                file_uri: file_uri.to_string(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
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
struct UploadResponse {
    file: FileResource,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    /// Resource name, e.g. `files/abc-123`
    name: String,
    uri: String,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    code: u16,
    message: String,
}

// ============================================================================
// Remote file guard
// ============================================================================

/// An uploaded file that must be deleted once the request is done.
///
/// `release` deletes it explicitly and is awaited on every path out of
/// `transcribe`, including the client's own deadline. If the owning future is
/// dropped first anyway, `Drop` spawns the delete, which only completes while
/// the runtime is still alive.
struct RemoteFile {
    resource: FileResource,
    delete_url: String,
    client: Client,
    released: bool,
}

impl RemoteFile {
    async fn release(mut self) {
        let result = self.client.delete(&self.delete_url).send().await;
        self.released = true;

        match result {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(file = %self.resource.name, "Deleted uploaded audio");
            }
            Ok(resp) => {
                tracing::warn!(
                    file = %self.resource.name,
                    status = %resp.status(),
                    "Failed to delete uploaded audio"
                );
            }
            Err(e) => {
                tracing::warn!(file = %self.resource.name, error = %e.without_url(), "Failed to delete uploaded audio");
            }
        }
    }
}

impl Drop for RemoteFile {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let name = self.resource.name.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let client = self.client.clone();
                let url = std::mem::take(&mut self.delete_url);
                handle.spawn(async move {
                    if let Err(e) = client.delete(&url).send().await {
                        tracing::warn!(file = %name, error = %e.without_url(), "Deferred delete of uploaded audio failed");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(file = %name, "No runtime to delete uploaded audio; it will expire remotely");
            }
        }
    }
}

// ============================================================================
// GeminiClient
// ============================================================================

/// Gemini client bound to a single model
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    /// Ceiling for the work between upload and delete
    timeout: Duration,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self, ModelError> {
        Self::with_base_url(api_key, model, timeout, DEFAULT_BASE_URL.to_string())
    }

    /// Create a client with a custom base URL (for testing / proxies)
    pub fn with_base_url(
        api_key: String,
        model: String,
        timeout: Duration,
        base_url: String,
    ) -> Result<Self, ModelError> {
        if api_key.trim().is_empty() {
            return Err(ModelError::MissingApiKey);
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key,
            model: normalize_model(&model),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Model resource name, always `models/...`
    pub fn model(&self) -> &str {
        &self.model
    }

    fn api_url(&self, resource: &str) -> String {
        format!("{}/{}/{}?key={}", self.base_url, API_VERSION, resource, self.api_key)
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/upload/{}/files?uploadType=media&key={}",
            self.base_url, API_VERSION, self.api_key
        )
    }

    /// Upload a recording and hand back the guard that will delete it
    async fn upload(&self, audio: &AudioInput) -> Result<RemoteFile, ModelError> {
        let bytes = tokio::fs::read(&audio.path).await?;
        let size = bytes.len();

        let response = self
            .client
            .post(self.upload_url())
            .header("X-Goog-Upload-Protocol", "raw")
            .header(CONTENT_TYPE, audio.format.mime_type())
            .body(bytes)
            .send()
            .await?;

        let upload: UploadResponse = read_json(response).await?;

        tracing::debug!(file = %upload.file.name, bytes = size, "Uploaded audio");

        Ok(RemoteFile {
            delete_url: self.api_url(&upload.file.name),
            resource: upload.file,
            client: self.client.clone(),
            released: false,
        })
    }

    /// Wait until the uploaded file leaves the `PROCESSING` state
    async fn wait_until_active(&self, file: &RemoteFile) -> Result<FileResource, ModelError> {
        let mut resource = file.resource.clone();

        for _ in 0..MAX_STATE_POLLS {
            match resource.state.as_deref() {
                Some("PROCESSING") => {
                    tokio::time::sleep(STATE_POLL_INTERVAL).await;
                    let response = self.client.get(self.api_url(&resource.name)).send().await?;
                    resource = read_json(response).await?;
                }
                Some("FAILED") => {
                    return Err(ModelError::Upload(format!(
                        "{} failed remote processing",
                        resource.name
                    )));
                }
                _ => return Ok(resource),
            }
        }

        Err(ModelError::Upload(format!(
            "{} still processing after {} polls",
            resource.name, MAX_STATE_POLLS
        )))
    }

    async fn generate_content(&self, request: &GenerateContentRequest) -> Result<String, ModelError> {
        let url = self.api_url(&format!("{}:generateContent", self.model));
        let response = self.client.post(&url).json(request).send().await?;
        let body: GenerateContentResponse = read_json(response).await?;

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ModelError::EmptyResponse);
        }

        Ok(text)
    }
}

#[async_trait]
impl SpeechModel for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn transcribe(&self, audio: &AudioInput, prompt: &str) -> Result<String, ModelError> {
        let file = self.upload(audio).await?;

        let work = async {
            let resource = self.wait_until_active(&file).await?;
            let mime_type = resource
                .mime_type
                .as_deref()
                .unwrap_or_else(|| audio.format.mime_type());

            let request = GenerateContentRequest {
                contents: vec![Content {
                    role: Some("user"),
                    parts: vec![Part::text(prompt), Part::file(mime_type, &resource.uri)],
                }],
                system_instruction: None,
                generation_config: None,
            };

            self.generate_content(&request).await
        };

        // The delete is awaited on every path, including the deadline
        let result = tokio::time::timeout(self.timeout, work)
            .await
            .unwrap_or(Err(ModelError::TimedOut(self.timeout)));

        file.release().await;

        result
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, ModelError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part::text(request.user_prompt.as_str())],
            }],
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part::text(request.system_prompt.as_str())],
            }),
            generation_config: Some(GenerationConfig {
                temperature: request.temperature,
                response_mime_type: request.response_mime_type.clone(),
            }),
        };

        tracing::debug!(model = %self.model, temperature = request.temperature, "Requesting completion");

        self.generate_content(&body).await
    }
}

/// Decode a success body, or turn an error body into `ModelError::Api`
async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, ModelError> {
    let status = response.status();

    if !status.is_success() {
        let error_body = response.text().await.unwrap_or_default();
        let error_detail = serde_json::from_str::<GeminiErrorResponse>(&error_body)
            .ok()
            .and_then(|e| e.error);

        let (code, message) = error_detail
            .map(|e| (e.code, e.message))
            .unwrap_or((status.as_u16(), error_body));

        tracing::error!(code = code, message = %message, "Gemini API error");

        return Err(ModelError::Api { code, message });
    }

    Ok(response.json().await?)
}

fn normalize_model(model: &str) -> String {
    let model = model.trim();
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}
