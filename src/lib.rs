//! reception-agent - Voice-to-ticket pipeline for a front desk
//!
//! Turns a recorded customer call into a structured, routed support ticket
//! using hosted speech-to-text and language models.
//!
//! # Architecture
//!
//! Each run is strictly sequential:
//! - Transcribe the recording (uploads are staged to a temp file first)
//! - Extract eight ticket fields as JSON from the transcript
//! - Check the result against the closed vocabularies
//! - Append the ticket to SQLite
//!
//! Model output is untrusted: unparseable or out-of-vocabulary analyses are
//! replaced by a low-confidence fallback record so a ticket is still created.
//!
//! # Modules
//!
//! - `adapters`: Hosted model traits and the Gemini client
//! - `ingest`: Audio formats, upload staging, transcription
//! - `core`: Extraction, validation, ticket store, pipeline
//! - `domain`: Vocabularies, analysis results, tickets
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Process a recording
//! reception-agent process call.m4a
//!
//! # Show the latest tickets
//! reception-agent recent --limit 10 --department Billing
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod ingest;

// Re-export main types at crate root for convenience
pub use crate::core::{CallPipeline, ProcessedCall, TicketFilter, TicketStore};
pub use domain::{AnalysisResult, CallAnalysis, NewTicket, Ticket};
