//! Call processing pipeline.
//!
//! One run goes transcribe → analyze → validate → persist, strictly in order.
//! Transcription and storage failures propagate; extraction failures and
//! rejected candidates are replaced by the fallback record so a ticket is
//! still created.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use super::extraction::Extractor;
use super::ticket_store::{StoreError, TicketStore};
use super::validation::check;
use crate::adapters::GeminiClient;
use crate::config::ResolvedConfig;
use crate::domain::{AnalysisResult, CallAnalysis, NewTicket, Ticket};
use crate::ingest::{AudioError, StagedAudio, Transcriber, TranscriptionError};

/// Errors that stop a pipeline run before a ticket exists
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Transcription(#[from] TranscriptionError),

    #[error("Failed to save ticket: {0}")]
    Storage(#[from] StoreError),

    #[error("Storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// How the stored analysis was obtained
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    /// The model's record passed the validation gate
    Validated,

    /// The fallback record was stored instead
    Fallback {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        raw_response: Option<String>,
    },
}

impl AnalysisOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Validated => "validated",
            Self::Fallback { .. } => "fallback",
        }
    }
}

/// Result of one pipeline run, handed to whatever renders it
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedCall {
    pub run_id: Uuid,
    pub ticket: Ticket,
    pub outcome: AnalysisOutcome,
}

/// Transcribe → analyze → validate → persist
#[derive(Clone)]
pub struct CallPipeline {
    transcriber: Transcriber,
    extractor: Extractor,
    store: TicketStore,
}

impl CallPipeline {
    pub fn new(transcriber: Transcriber, extractor: Extractor, store: TicketStore) -> Self {
        Self {
            transcriber,
            extractor,
            store,
        }
    }

    /// Build the Gemini-backed pipeline from resolved configuration
    pub fn from_config(config: &ResolvedConfig, api_key: String) -> Result<Self> {
        let speech = GeminiClient::with_base_url(
            api_key.clone(),
            config.stt_model.clone(),
            config.timeout,
            config.base_url.clone(),
        )
        .context("Failed to create transcription client")?;

        let language = GeminiClient::with_base_url(
            api_key,
            config.model.clone(),
            config.timeout,
            config.base_url.clone(),
        )
        .context("Failed to create extraction client")?;

        let store = TicketStore::open(&config.database).with_context(|| {
            format!("Failed to open ticket database: {}", config.database.display())
        })?;

        Ok(Self::new(
            Transcriber::new(Arc::new(speech), config.timeout),
            Extractor::new(Arc::new(language), config.timeout).with_temperature(config.temperature),
            store,
        ))
    }

    pub fn store(&self) -> &TicketStore {
        &self.store
    }

    /// Process a recording already on disk
    pub async fn process_call(&self, audio_path: &Path) -> Result<ProcessedCall, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("pipeline", %run_id);

        self.run(run_id, audio_path).instrument(span).await
    }

    /// Process an uploaded recording. The bytes are staged to a temp file
    /// that is removed once the run ends, whether it succeeded or not.
    pub async fn process_upload(
        &self,
        bytes: &[u8],
        file_name: Option<&str>,
        mime_type: Option<&str>,
    ) -> Result<ProcessedCall, PipelineError> {
        let staged = StagedAudio::stage(bytes, file_name, mime_type)?;
        let result = self.process_call(staged.path()).await;
        drop(staged);

        result
    }

    async fn run(&self, run_id: Uuid, audio_path: &Path) -> Result<ProcessedCall, PipelineError> {
        tracing::info!(path = %audio_path.display(), "Pipeline started");

        let transcript = match self.transcriber.transcribe(audio_path).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "Transcription failed; no ticket created");
                return Err(e.into());
            }
        };

        let (analysis, outcome) = gate(self.extractor.analyze(&transcript).await);
        let new_ticket = NewTicket::from_analysis(transcript, analysis.normalize_caller());

        let store = self.store.clone();
        let ticket = tokio::task::spawn_blocking(move || -> Result<Ticket, StoreError> {
            let id = store.insert(&new_ticket)?;
            store.get(id)?.ok_or(StoreError::NotFound(id))
        })
        .await??;

        tracing::info!(
            ticket_id = ticket.id,
            outcome = outcome.label(),
            department = %ticket.department,
            priority = %ticket.priority,
            "Ticket stored"
        );

        Ok(ProcessedCall {
            run_id,
            ticket,
            outcome,
        })
    }
}

/// Pass the extraction result through the validation gate
fn gate(result: AnalysisResult) -> (CallAnalysis, AnalysisOutcome) {
    match result {
        AnalysisResult::Extracted(record) => match check(&record) {
            Ok(analysis) => (analysis, AnalysisOutcome::Validated),
            Err(reason) => {
                let error = format!("Analysis failed validation: {}", reason);
                tracing::warn!(%reason, "Candidate rejected; storing fallback ticket");
                (
                    CallAnalysis::fallback(error.clone()),
                    AnalysisOutcome::Fallback {
                        error,
                        raw_response: Some(Value::Object(record).to_string()),
                    },
                )
            }
        },
        AnalysisResult::Fallback(fallback) => (
            fallback.analysis,
            AnalysisOutcome::Fallback {
                error: fallback.error,
                raw_response: fallback.raw_response,
            },
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Department, IntentCategory, Priority, Sentiment};
    use serde_json::json;

    fn record(value: Value) -> AnalysisResult {
        match value {
            Value::Object(map) => AnalysisResult::Extracted(map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_gate_accepts_valid_record() {
        let (analysis, outcome) = gate(record(json!({
            "caller_name": null,
            "caller_contact": null,
            "intent_category": "billing_issue",
            "sentiment": "negative",
            "priority": "high",
            "department": "Billing",
            "summary_short": "Double charge",
            "summary_full": "Charged twice for March."
        })));

        assert_eq!(outcome, AnalysisOutcome::Validated);
        assert_eq!(analysis.intent_category, IntentCategory::BillingIssue);
        assert_eq!(analysis.department, Department::Billing);
    }

    #[test]
    fn test_gate_substitutes_out_of_vocabulary() {
        let (analysis, outcome) = gate(record(json!({
            "caller_name": "Lee",
            "caller_contact": null,
            "intent_category": "refund",
            "sentiment": "negative",
            "priority": "urgent",
            "department": "Billing",
            "summary_short": "Refund",
            "summary_full": "Wants a refund."
        })));

        assert_eq!(analysis.intent_category, IntentCategory::Other);
        assert_eq!(analysis.sentiment, Sentiment::Neutral);
        assert_eq!(analysis.priority, Priority::Medium);
        assert_eq!(analysis.department, Department::General);
        assert!(analysis.caller_name.is_none());

        match outcome {
            AnalysisOutcome::Fallback { error, raw_response } => {
                assert!(error.contains("intent_category"));
                assert!(raw_response.unwrap().contains("refund"));
            }
            other => panic!("expected fallback, got {:?}", other),
        }
    }

    #[test]
    fn test_gate_keeps_extraction_fallback() {
        let (analysis, outcome) = gate(AnalysisResult::fallback(
            "Failed to parse AI response as JSON: eof".to_string(),
            Some("not json".to_string()),
            "Failed to parse AI response: not json".to_string(),
        ));

        assert_eq!(analysis.summary_full, "Failed to parse AI response: not json");
        assert_eq!(
            outcome,
            AnalysisOutcome::Fallback {
                error: "Failed to parse AI response as JSON: eof".to_string(),
                raw_response: Some("not json".to_string()),
            }
        );
    }

    #[test]
    fn test_outcome_serialization() {
        let value = serde_json::to_value(AnalysisOutcome::Validated).unwrap();
        assert_eq!(value, json!({"status": "validated"}));

        let value = serde_json::to_value(AnalysisOutcome::Fallback {
            error: "boom".to_string(),
            raw_response: None,
        })
        .unwrap();
        assert_eq!(value, json!({"status": "fallback", "error": "boom"}));
    }
}
