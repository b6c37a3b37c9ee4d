//! Core call-processing logic.
//!
//! This module contains:
//! - Extraction: prompt construction and structured analysis
//! - Validation: the vocabulary gate
//! - TicketStore: append-only SQLite persistence
//! - CallPipeline: the end-to-end run

pub mod extraction;
pub mod pipeline;
pub mod ticket_store;
pub mod validation;

// Re-export commonly used types
pub use extraction::{ExtractionError, Extractor};
pub use pipeline::{AnalysisOutcome, CallPipeline, PipelineError, ProcessedCall};
pub use ticket_store::{StoreError, TicketFilter, TicketStore};
pub use validation::{check, validate, ValidationFailure};
