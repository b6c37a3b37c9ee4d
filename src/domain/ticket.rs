//! Support tickets.
//!
//! A ticket is created exactly once, after validation, and never changes.

use serde::{Deserialize, Serialize};

use super::analysis::CallAnalysis;
use super::vocabulary::{Department, IntentCategory, Priority, Sentiment};

/// Insert payload for the ticket store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTicket {
    /// ISO-8601 timestamp; assigned by the store when absent. Values without
    /// an offset are taken as UTC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    pub caller_name: Option<String>,
    pub caller_contact: Option<String>,
    pub intent_category: IntentCategory,
    pub department: Department,
    pub priority: Priority,
    pub sentiment: Sentiment,
    /// Full transcription; may be empty
    pub transcript: String,
    pub summary_short: String,
    pub summary_full: String,
}

impl NewTicket {
    /// Combine a transcript with its analysis
    pub fn from_analysis(transcript: impl Into<String>, analysis: CallAnalysis) -> Self {
        Self {
            created_at: None,
            caller_name: analysis.caller_name,
            caller_contact: analysis.caller_contact,
            intent_category: analysis.intent_category,
            department: analysis.department,
            priority: analysis.priority,
            sentiment: analysis.sentiment,
            transcript: transcript.into(),
            summary_short: analysis.summary_short,
            summary_full: analysis.summary_full,
        }
    }

    /// Pin the creation timestamp
    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = Some(created_at.into());
        self
    }
}

/// A persisted ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub created_at: String,
    pub caller_name: Option<String>,
    pub caller_contact: Option<String>,
    pub intent_category: IntentCategory,
    pub department: Department,
    pub priority: Priority,
    pub sentiment: Sentiment,
    pub transcript: String,
    pub summary_short: String,
    pub summary_full: String,
}

impl Ticket {
    /// Caller label for listings
    pub fn caller_label(&self) -> &str {
        self.caller_name.as_deref().unwrap_or("Unknown")
    }

    /// Whether this ticket carries the same content as an insert payload
    /// (ignores `id` and `created_at`)
    pub fn matches(&self, ticket: &NewTicket) -> bool {
        self.caller_name == ticket.caller_name
            && self.caller_contact == ticket.caller_contact
            && self.intent_category == ticket.intent_category
            && self.department == ticket.department
            && self.priority == ticket.priority
            && self.sentiment == ticket.sentiment
            && self.transcript == ticket.transcript
            && self.summary_short == ticket.summary_short
            && self.summary_full == ticket.summary_full
    }
}
