//! Transcription adapter.
//!
//! Sends a recording to the hosted speech model and returns the plain text.
//! No retries: a failed call is reported to the caller, who decides.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::timeout;

use super::audio::{AudioError, AudioFormat};
use crate::adapters::{AudioInput, ModelError, SpeechModel};

/// Instruction sent alongside every recording
pub const TRANSCRIPTION_PROMPT: &str =
    "Transcribe this audio file. Provide only the transcription text without any additional explanation.";

/// Errors that can occur while transcribing
#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("Transcription model failed: {0}")]
    Model(#[from] ModelError),

    #[error("Transcription timed out after {0:?}")]
    TimedOut(Duration),
}

/// Extra time the model gets past `timeout` to clean up remote state
pub const DEFAULT_CLEANUP_GRACE: Duration = Duration::from_secs(10);

/// Transcribes recordings through a [`SpeechModel`]
#[derive(Clone)]
pub struct Transcriber {
    model: Arc<dyn SpeechModel>,
    timeout: Duration,
    cleanup_grace: Duration,
}

impl Transcriber {
    pub fn new(model: Arc<dyn SpeechModel>, timeout: Duration) -> Self {
        Self {
            model,
            timeout,
            cleanup_grace: DEFAULT_CLEANUP_GRACE,
        }
    }

    /// How long past `timeout` the model call may run before it is abandoned.
    /// A model that enforces its own deadline uses this window to delete
    /// what it uploaded.
    pub fn with_cleanup_grace(mut self, grace: Duration) -> Self {
        self.cleanup_grace = grace;
        self
    }

    /// Transcribe the recording at `audio_path`
    pub async fn transcribe(&self, audio_path: &Path) -> Result<String, TranscriptionError> {
        let format = AudioFormat::from_path(audio_path)?;

        let metadata = tokio::fs::metadata(audio_path).await.map_err(AudioError::from)?;
        if !metadata.is_file() {
            return Err(AudioError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a file", audio_path.display()),
            ))
            .into());
        }

        let audio = AudioInput {
            path: audio_path.to_path_buf(),
            format,
        };

        tracing::info!(
            model = self.model.name(),
            %format,
            bytes = metadata.len(),
            "Transcribing audio"
        );

        let deadline = self.timeout + self.cleanup_grace;
        let text = match timeout(deadline, self.model.transcribe(&audio, TRANSCRIPTION_PROMPT)).await {
            Ok(Ok(text)) => text,
            Ok(Err(ModelError::TimedOut(after))) => return Err(TranscriptionError::TimedOut(after)),
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(TranscriptionError::TimedOut(self.timeout)),
        };

        let text = text.trim().to_string();
        tracing::info!(chars = text.len(), "Transcription complete");

        Ok(text)
    }
}
