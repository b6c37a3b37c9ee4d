//! Closed vocabularies for ticket classification.
//!
//! Every enum field on a ticket must be one of these values. Spellings are
//! exact: `"HR"` is a department, `"hr"` is not.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A value outside one of the closed vocabularies
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{value}' is not a valid {field}")]
pub struct UnknownVariant {
    pub field: &'static str,
    pub value: String,
}

/// Shared behaviour of the closed vocabularies
pub trait Vocabulary: Sized + Copy + 'static {
    /// Ticket field this vocabulary constrains
    const FIELD: &'static str;

    /// Every member, in prompt order
    const ALL: &'static [Self];

    /// Wire spelling
    fn as_str(&self) -> &'static str;

    /// Exact-match lookup
    fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.as_str() == value)
    }

    /// Comma-separated member list, as embedded in prompts
    fn joined() -> String {
        Self::ALL
            .iter()
            .map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Why the caller got in touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentCategory {
    Complaint,
    SupportRequest,
    Appointment,
    BillingIssue,
    HrRequest,
    GeneralQuery,
    Other,
}

impl Vocabulary for IntentCategory {
    const FIELD: &'static str = "intent_category";
    const ALL: &'static [Self] = &[
        Self::Complaint,
        Self::SupportRequest,
        Self::Appointment,
        Self::BillingIssue,
        Self::HrRequest,
        Self::GeneralQuery,
        Self::Other,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Complaint => "complaint",
            Self::SupportRequest => "support_request",
            Self::Appointment => "appointment",
            Self::BillingIssue => "billing_issue",
            Self::HrRequest => "hr_request",
            Self::GeneralQuery => "general_query",
            Self::Other => "other",
        }
    }
}

/// Urgency of the ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Vocabulary for Priority {
    const FIELD: &'static str = "priority";
    const ALL: &'static [Self] = &[Self::Low, Self::Medium, Self::High, Self::Critical];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Caller tone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Vocabulary for Sentiment {
    const FIELD: &'static str = "sentiment";
    const ALL: &'static [Self] = &[Self::Positive, Self::Neutral, Self::Negative];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }
}

/// Team the ticket is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Department {
    Support,
    Billing,
    #[serde(rename = "HR")]
    Hr,
    Sales,
    Administration,
    General,
}

impl Vocabulary for Department {
    const FIELD: &'static str = "department";
    const ALL: &'static [Self] = &[
        Self::Support,
        Self::Billing,
        Self::Hr,
        Self::Sales,
        Self::Administration,
        Self::General,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Support => "Support",
            Self::Billing => "Billing",
            Self::Hr => "HR",
            Self::Sales => "Sales",
            Self::Administration => "Administration",
            Self::General => "General",
        }
    }
}

fn parse_or_unknown<V: Vocabulary>(value: &str) -> Result<V, UnknownVariant> {
    V::parse(value).ok_or_else(|| UnknownVariant {
        field: V::FIELD,
        value: value.to_string(),
    })
}

impl FromStr for IntentCategory {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_or_unknown(s)
    }
}

impl FromStr for Priority {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_or_unknown(s)
    }
}

impl FromStr for Sentiment {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_or_unknown(s)
    }
}

impl FromStr for Department {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_or_unknown(s)
    }
}

impl fmt::Display for IntentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}
