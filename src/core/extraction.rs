//! Structured extraction of ticket metadata from a transcript.
//!
//! The model is asked for a JSON object with eight fixed fields. Its output is
//! untrusted: anything that fails to come back as a JSON object is replaced by
//! the fallback record, so extraction never fails the pipeline.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::time::timeout;

use crate::adapters::{GenerationRequest, LanguageModel, ModelError};
use crate::domain::{AnalysisResult, Department, IntentCategory, Priority, Sentiment, Vocabulary};

/// Default sampling temperature for extraction
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Why extraction fell back
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("{0}")]
    Call(#[from] ModelError),

    #[error("model did not answer within {0:?}")]
    TimedOut(Duration),

    #[error("{0}")]
    Parse(#[from] serde_json::Error),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Instruction prompt embedding the four vocabularies and the output schema
pub fn system_prompt() -> String {
    format!(
        r#"You are an AI assistant that analyzes customer service calls and extracts structured information.

Please analyze the following call transcript and respond ONLY with a JSON object that follows this exact schema:
{{
    "caller_name": "string or null",
    "caller_contact": "string or null",
    "intent_category": "one of: {intents}",
    "sentiment": "one of: {sentiments}",
    "priority": "one of: {priorities}",
    "department": "one of: {departments}",
    "summary_short": "1-2 line summary",
    "summary_full": "3-6 line detailed summary"
}}

Guidelines:
- Extract caller information (name, contact) only if explicitly mentioned in the transcript
- For contact information, prioritize email over phone number if both are available
- Choose the most appropriate intent category from the provided list
- Assess sentiment based on the tone and content of the call
- Assign priority based on urgency and importance of the issue
- Route to the most appropriate department
- Provide a concise summary and a more detailed summary
- Respond ONLY with valid JSON, no additional text or markdown"#,
        intents = IntentCategory::joined(),
        sentiments = Sentiment::joined(),
        priorities = Priority::joined(),
        departments = Department::joined(),
    )
}

/// User turn carrying the transcript
pub fn user_prompt(transcript: &str) -> String {
    format!("Please analyze this call transcript:\n\n{}", transcript)
}

/// Parse the model's text as a JSON object
pub fn parse_candidate(text: &str) -> Result<Map<String, Value>, ExtractionError> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => Ok(map),
        Value::Array(_) => Err(ExtractionError::NotAnObject("an array")),
        Value::String(_) => Err(ExtractionError::NotAnObject("a string")),
        Value::Number(_) => Err(ExtractionError::NotAnObject("a number")),
        Value::Bool(_) => Err(ExtractionError::NotAnObject("a boolean")),
        Value::Null => Err(ExtractionError::NotAnObject("null")),
    }
}

/// Runs structured extraction against a [`LanguageModel`]
#[derive(Clone)]
pub struct Extractor {
    model: Arc<dyn LanguageModel>,
    temperature: f32,
    timeout: Duration,
}

impl Extractor {
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self {
            model,
            temperature: DEFAULT_TEMPERATURE,
            timeout,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Analyze a transcript. Always returns a result; failures are folded
    /// into [`AnalysisResult::Fallback`].
    pub async fn analyze(&self, transcript: &str) -> AnalysisResult {
        let request = GenerationRequest::json(system_prompt(), user_prompt(transcript), self.temperature);

        tracing::info!(
            model = self.model.name(),
            chars = transcript.len(),
            "Extracting ticket fields"
        );

        let response = match timeout(self.timeout, self.model.generate(&request)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => return call_failed(ExtractionError::Call(e)),
            Err(_) => return call_failed(ExtractionError::TimedOut(self.timeout)),
        };

        match parse_candidate(&response) {
            Ok(record) => {
                tracing::info!(fields = record.len(), "Extraction parsed");
                AnalysisResult::Extracted(record)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Model response is not a JSON object; using fallback");
                AnalysisResult::fallback(
                    format!("Failed to parse AI response as JSON: {}", e),
                    Some(response.clone()),
                    format!("Failed to parse AI response: {}", response),
                )
            }
        }
    }
}

fn call_failed(error: ExtractionError) -> AnalysisResult {
    tracing::warn!(error = %error, "Extraction call failed; using fallback");
    let message = format!("Failed to analyze call: {}", error);
    AnalysisResult::fallback(message.clone(), None, message)
}
