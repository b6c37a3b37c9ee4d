//! Voice message ingestion.
//!
//! Raw recordings enter the system here:
//!
//! 1. **Audio**: format detection and temp-file staging for uploads
//! 2. **Transcriber**: hosted speech-to-text, returns plain text
//!
//! # Architecture
//!
//! ```text
//! upload bytes → StagedAudio (temp file) → Transcriber → transcript
//!                      ↓
//!            removed on drop, success or failure
//! ```

pub mod audio;
pub mod transcriber;

// Re-export key types
pub use audio::{AudioError, AudioFormat, StagedAudio};
pub use transcriber::{Transcriber, TranscriptionError, TRANSCRIPTION_PROMPT};
