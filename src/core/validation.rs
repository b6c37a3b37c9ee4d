//! Validation gate between extraction and persistence.
//!
//! Checks that a candidate record carries all eight fields and that every
//! classification is drawn from its closed vocabulary. The gate never rewrites
//! the record; deciding what to do with a rejected one is up to the caller.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::{CallAnalysis, Department, IntentCategory, Priority, Sentiment, Vocabulary, REQUIRED_FIELDS};

/// Why a candidate record was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("{field} '{value}' is not in the allowed set")]
    OutOfVocabulary { field: &'static str, value: String },
}

/// True when the record passes the gate
pub fn validate(record: &Map<String, Value>) -> bool {
    check(record).is_ok()
}

/// Validate and convert to a typed [`CallAnalysis`]
pub fn check(record: &Map<String, Value>) -> Result<CallAnalysis, ValidationFailure> {
    if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| !record.contains_key(**f)) {
        return Err(ValidationFailure::MissingField(*missing));
    }

    Ok(CallAnalysis {
        caller_name: optional_text(&record["caller_name"]),
        caller_contact: optional_text(&record["caller_contact"]),
        intent_category: vocabulary::<IntentCategory>(record)?,
        sentiment: vocabulary::<Sentiment>(record)?,
        priority: vocabulary::<Priority>(record)?,
        department: vocabulary::<Department>(record)?,
        summary_short: text(&record["summary_short"]),
        summary_full: text(&record["summary_full"]),
    })
}

fn vocabulary<V: Vocabulary>(record: &Map<String, Value>) -> Result<V, ValidationFailure> {
    let value = &record[V::FIELD];
    value
        .as_str()
        .and_then(V::parse)
        .ok_or_else(|| ValidationFailure::OutOfVocabulary {
            field: V::FIELD,
            value: match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        })
}

// Free-text fields are not type-checked by the gate; non-strings are kept as
// their JSON rendering so nothing the model said is lost.
fn optional_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn text(value: &Value) -> String {
    optional_text(value).unwrap_or_default()
}
