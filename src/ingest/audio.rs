//! Audio formats and temporary staging of uploaded recordings.

use std::fmt;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Errors handling raw audio input
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Supported recording formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Mp3,
    M4a,
    Ogg,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 4] = [Self::Wav, Self::Mp3, Self::M4a, Self::Ogg];

    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::M4a => "m4a",
            Self::Ogg => "ogg",
        }
    }

    /// MIME type sent with the upload
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Mp3 => "audio/mpeg",
            Self::M4a => "audio/mp4",
            Self::Ogg => "audio/ogg",
        }
    }

    /// Case-insensitive extension lookup (with or without the leading dot)
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        Self::ALL.into_iter().find(|f| f.extension() == ext)
    }

    /// MIME fallback for uploads whose name carries no extension
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "audio/wav" | "audio/x-wav" => Some(Self::Wav),
            "audio/mpeg" => Some(Self::Mp3),
            "audio/mp4" | "audio/x-m4a" => Some(Self::M4a),
            "audio/ogg" => Some(Self::Ogg),
            // Some recorders label m4a as a generic byte stream
            "application/octet-stream" => Some(Self::M4a),
            _ => None,
        }
    }

    /// Format of a file on disk, from its extension
    pub fn from_path(path: &Path) -> Result<Self, AudioError> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();

        Self::from_extension(&ext).ok_or_else(|| {
            AudioError::UnsupportedFormat(if ext.is_empty() {
                format!("{} has no extension", path.display())
            } else {
                ext
            })
        })
    }

    /// Resolve the format of an upload: extension first, then MIME type
    pub fn detect(file_name: Option<&str>, mime: Option<&str>) -> Result<Self, AudioError> {
        let ext = file_name
            .and_then(|name| Path::new(name).extension())
            .map(|e| e.to_string_lossy().to_string());

        if let Some(ref ext) = ext {
            if let Some(format) = Self::from_extension(ext) {
                return Ok(format);
            }
        }

        if let Some(format) = mime.and_then(Self::from_mime) {
            return Ok(format);
        }

        Err(AudioError::UnsupportedFormat(
            ext.or_else(|| mime.map(str::to_string))
                .unwrap_or_else(|| "unknown".to_string()),
        ))
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.extension())
    }
}

/// An uploaded recording written to a temporary file.
///
/// The file is removed when this value is dropped.
#[derive(Debug)]
pub struct StagedAudio {
    file: NamedTempFile,
    format: AudioFormat,
}

impl StagedAudio {
    /// Write `bytes` to a fresh temp file named with the detected extension
    pub fn stage(bytes: &[u8], file_name: Option<&str>, mime: Option<&str>) -> Result<Self, AudioError> {
        let format = AudioFormat::detect(file_name, mime)?;

        let mut file = tempfile::Builder::new()
            .prefix("reception-")
            .suffix(&format!(".{}", format.extension()))
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;

        tracing::debug!(path = %file.path().display(), bytes = bytes.len(), %format, "Staged audio");

        Ok(Self { file, format })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }
}
