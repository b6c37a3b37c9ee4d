//! Adapter interfaces for hosted models.
//!
//! The pipeline talks to speech-to-text and language models only through
//! these traits, so tests can swap in scripted models.

pub mod gemini;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::ingest::audio::AudioFormat;

// Re-export the Gemini adapter
pub use gemini::GeminiClient;

/// Errors from a hosted model call
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Model returned no text")]
    EmptyResponse,

    #[error("Model call timed out after {0:?}")]
    TimedOut(std::time::Duration),

    #[error("Missing API key")]
    MissingApiKey,

    #[error("File upload failed: {0}")]
    Upload(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// Request URLs carry the API key; keep them out of error messages
impl From<reqwest::Error> for ModelError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.without_url())
    }
}

/// A recording to transcribe
#[derive(Debug, Clone)]
pub struct AudioInput {
    pub path: PathBuf,
    pub format: AudioFormat,
}

/// A single prompt-pair completion request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,

    /// Set to `application/json` to request JSON-mode output
    pub response_mime_type: Option<String>,
}

impl GenerationRequest {
    /// Request a JSON-formatted completion
    pub fn json(system_prompt: String, user_prompt: String, temperature: f32) -> Self {
        Self {
            system_prompt,
            user_prompt,
            temperature,
            response_mime_type: Some("application/json".to_string()),
        }
    }
}

/// Hosted speech-to-text model
#[async_trait]
pub trait SpeechModel: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Upload the recording and return the model's text reply to `prompt`.
    ///
    /// A reply with no text (e.g. a silent recording) is
    /// [`ModelError::EmptyResponse`], not an empty transcript. Implementations
    /// that stage the audio remotely must remove it before returning, also
    /// when their own deadline expires.
    async fn transcribe(&self, audio: &AudioInput, prompt: &str) -> Result<String, ModelError>;
}

/// Hosted text-completion model
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Run one completion and return the raw response text
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ModelError>;
}
