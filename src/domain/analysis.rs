//! Structured call analysis.
//!
//! The language model returns an untrusted JSON object. It is carried as an
//! [`AnalysisResult`] until the validation gate either accepts it as a typed
//! [`CallAnalysis`] or the pipeline substitutes the fallback record.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::vocabulary::{Department, IntentCategory, Priority, Sentiment};

/// Fields every extracted record must carry
pub const REQUIRED_FIELDS: [&str; 8] = [
    "caller_name",
    "caller_contact",
    "intent_category",
    "sentiment",
    "priority",
    "department",
    "summary_short",
    "summary_full",
];

/// Short summary used on every fallback record
pub const FALLBACK_SUMMARY: &str = "Analysis failed";

/// A validated, vocabulary-conformant analysis of one call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallAnalysis {
    pub caller_name: Option<String>,
    pub caller_contact: Option<String>,
    pub intent_category: IntentCategory,
    pub sentiment: Sentiment,
    pub priority: Priority,
    pub department: Department,
    pub summary_short: String,
    pub summary_full: String,
}

impl CallAnalysis {
    /// The low-confidence record used whenever extraction cannot be trusted
    pub fn fallback(summary_full: impl Into<String>) -> Self {
        Self {
            caller_name: None,
            caller_contact: None,
            intent_category: IntentCategory::Other,
            sentiment: Sentiment::Neutral,
            priority: Priority::Medium,
            department: Department::General,
            summary_short: FALLBACK_SUMMARY.to_string(),
            summary_full: summary_full.into(),
        }
    }

    /// Tidy the caller fields before persistence.
    ///
    /// Blank values become `None`. When the contact mixes an e-mail address
    /// with other details (typically a phone number), only the address is kept.
    pub fn normalize_caller(mut self) -> Self {
        self.caller_name = non_blank(self.caller_name);
        self.caller_contact = non_blank(self.caller_contact).map(|contact| {
            prefer_email(&contact).unwrap_or(contact)
        });
        self
    }

    /// JSON mapping view, keyed by the wire field names
    pub fn to_record(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// A substitute record plus the reason it was produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackAnalysis {
    pub analysis: CallAnalysis,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

/// Output of the structured extraction step
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisResult {
    /// Parsed JSON object from the model; vocabulary not yet checked
    Extracted(Map<String, Value>),

    /// Extraction failed; carries the substitute record
    Fallback(FallbackAnalysis),
}

impl AnalysisResult {
    pub fn fallback(error: String, raw_response: Option<String>, summary_full: String) -> Self {
        Self::Fallback(FallbackAnalysis {
            analysis: CallAnalysis::fallback(summary_full),
            error,
            raw_response,
        })
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Extracted(_) => None,
            Self::Fallback(f) => Some(&f.error),
        }
    }

    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Self::Extracted(_) => None,
            Self::Fallback(f) => f.raw_response.as_deref(),
        }
    }

    /// Flat mapping view; fallback records also carry `error` and `raw_response`
    pub fn to_record(&self) -> Map<String, Value> {
        match self {
            Self::Extracted(record) => record.clone(),
            Self::Fallback(f) => {
                let mut record = f.analysis.to_record();
                record.insert("error".to_string(), Value::String(f.error.clone()));
                if let Some(raw) = &f.raw_response {
                    record.insert("raw_response".to_string(), Value::String(raw.clone()));
                }
                record
            }
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Pick the e-mail address out of a free-form contact string.
///
/// Returns `None` when no token looks like an address, or when the address is
/// already the whole contact.
pub fn prefer_email(contact: &str) -> Option<String> {
    let email = contact
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '|' | '/'))
        .map(|token| {
            token.trim_matches(|c: char| matches!(c, '(' | ')' | '<' | '>' | '[' | ']' | '.' | ':' | '"' | '\''))
        })
        .find(|token| looks_like_email(token))?;

    if email == contact.trim() {
        None
    } else {
        Some(email.to_string())
    }
}

fn looks_like_email(token: &str) -> bool {
    let Some((local, domain)) = token.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}
