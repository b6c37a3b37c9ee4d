//! Domain types for the reception agent.
//!
//! This module contains the core data structures:
//! - Vocabulary: the closed sets tickets are classified into
//! - Analysis: the structured extraction result
//! - Ticket: the persisted support ticket

pub mod analysis;
pub mod ticket;
pub mod vocabulary;

// Re-export commonly used types
pub use analysis::{AnalysisResult, CallAnalysis, FallbackAnalysis, REQUIRED_FIELDS};
pub use ticket::{NewTicket, Ticket};
pub use vocabulary::{Department, IntentCategory, Priority, Sentiment, UnknownVariant, Vocabulary};
