//! Pipeline Integration Tests
//!
//! End-to-end runs with scripted models: the happy path, the two fallback
//! paths, and the failure paths that must not create a ticket.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reception_agent::adapters::{AudioInput, GenerationRequest, LanguageModel, ModelError, SpeechModel};
use reception_agent::core::{AnalysisOutcome, CallPipeline, Extractor, PipelineError, TicketStore};
use reception_agent::domain::{Department, IntentCategory, Priority, Sentiment};
use reception_agent::ingest::{AudioError, Transcriber, TranscriptionError};
use tempfile::TempDir;

/// Speech model that records which file it was handed
struct StubSpeech {
    reply: Result<String, u16>,
    seen: Mutex<Vec<PathBuf>>,
}

impl StubSpeech {
    fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn failing(code: u16) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(code),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<PathBuf> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechModel for StubSpeech {
    fn name(&self) -> &str {
        "stub-speech"
    }

    async fn transcribe(&self, audio: &AudioInput, _prompt: &str) -> Result<String, ModelError> {
        // The staged file must exist while the model reads it
        assert!(audio.path.exists());
        self.seen.lock().unwrap().push(audio.path.clone());
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(code) => Err(ModelError::Api {
                code: *code,
                message: "transcription unavailable".to_string(),
            }),
        }
    }
}

struct StubLanguage {
    reply: String,
    calls: Mutex<usize>,
}

impl StubLanguage {
    fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: text.to_string(),
            calls: Mutex::new(0),
        })
    }
}

#[async_trait]
impl LanguageModel for StubLanguage {
    fn name(&self) -> &str {
        "stub-language"
    }

    async fn generate(&self, _request: &GenerationRequest) -> Result<String, ModelError> {
        *self.calls.lock().unwrap() += 1;
        Ok(self.reply.clone())
    }
}

const VALID_ANALYSIS: &str = r#"{
    "caller_name": "Maria Lopez",
    "caller_contact": "+1 555 0100, maria@example.com",
    "intent_category": "billing_issue",
    "sentiment": "negative",
    "priority": "high",
    "department": "Billing",
    "summary_short": "Charged twice for March",
    "summary_full": "Caller was billed twice for the March subscription and wants a refund."
}"#;

fn pipeline(temp: &TempDir, speech: Arc<StubSpeech>, language: Arc<StubLanguage>) -> CallPipeline {
    let store = TicketStore::open(temp.path().join("tickets.db")).unwrap();
    CallPipeline::new(
        Transcriber::new(speech, Duration::from_secs(5)),
        Extractor::new(language, Duration::from_secs(5)),
        store,
    )
}

#[tokio::test]
async fn test_upload_creates_validated_ticket() {
    let temp = TempDir::new().unwrap();
    let speech = StubSpeech::replying("Hi, this is Maria. I was charged twice for March.");
    let pipeline = pipeline(&temp, speech.clone(), StubLanguage::replying(VALID_ANALYSIS));

    let processed = pipeline
        .process_upload(b"RIFF fake wav", Some("voicemail.wav"), Some("audio/wav"))
        .await
        .unwrap();

    assert_eq!(processed.outcome, AnalysisOutcome::Validated);

    let ticket = &processed.ticket;
    assert_eq!(ticket.id, 1);
    assert_eq!(ticket.caller_name.as_deref(), Some("Maria Lopez"));
    assert_eq!(ticket.caller_contact.as_deref(), Some("maria@example.com"));
    assert_eq!(ticket.intent_category, IntentCategory::BillingIssue);
    assert_eq!(ticket.department, Department::Billing);
    assert_eq!(ticket.priority, Priority::High);
    assert_eq!(ticket.sentiment, Sentiment::Negative);
    assert_eq!(ticket.transcript, "Hi, this is Maria. I was charged twice for March.");

    let stored = pipeline.store().fetch_recent(5).unwrap();
    assert_eq!(stored, vec![ticket.clone()]);

    // Staged upload is gone once the run ends
    let seen = speech.seen();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].extension().is_some_and(|ext| ext == "wav"));
    assert!(!seen[0].exists());
}

#[tokio::test]
async fn test_upload_without_extension_uses_mime_type() {
    let temp = TempDir::new().unwrap();
    let speech = StubSpeech::replying("hello");
    let pipeline = pipeline(&temp, speech.clone(), StubLanguage::replying(VALID_ANALYSIS));

    pipeline
        .process_upload(b"fake", Some("recording"), Some("audio/mpeg"))
        .await
        .unwrap();

    assert!(speech.seen()[0].extension().is_some_and(|ext| ext == "mp3"));
}

#[tokio::test]
async fn test_unparseable_analysis_still_creates_ticket() {
    let temp = TempDir::new().unwrap();
    let pipeline = pipeline(
        &temp,
        StubSpeech::replying("asdkjasd"),
        StubLanguage::replying("not json"),
    );

    let processed = pipeline
        .process_upload(b"fake", Some("call.m4a"), None)
        .await
        .unwrap();

    match &processed.outcome {
        AnalysisOutcome::Fallback {
            error,
            raw_response,
        } => {
            assert!(error.starts_with("Failed to parse AI response as JSON"));
            assert_eq!(raw_response.as_deref(), Some("not json"));
        }
        other => panic!("expected fallback, got {:?}", other),
    }

    let ticket = &processed.ticket;
    assert_eq!(ticket.intent_category, IntentCategory::Other);
    assert_eq!(ticket.sentiment, Sentiment::Neutral);
    assert_eq!(ticket.priority, Priority::Medium);
    assert_eq!(ticket.department, Department::General);
    assert_eq!(ticket.summary_short, "Analysis failed");
    assert!(ticket.summary_full.contains("not json"));
    assert_eq!(ticket.transcript, "asdkjasd");
    assert_eq!(pipeline.store().count().unwrap(), 1);
}

#[tokio::test]
async fn test_out_of_vocabulary_analysis_is_replaced() {
    let temp = TempDir::new().unwrap();
    let language = StubLanguage::replying(
        &VALID_ANALYSIS.replace("\"Billing\"", "\"Finance\""),
    );
    let pipeline = pipeline(&temp, StubSpeech::replying("billing question"), language);

    let processed = pipeline
        .process_upload(b"fake", Some("call.ogg"), None)
        .await
        .unwrap();

    assert_eq!(processed.ticket.department, Department::General);
    assert_eq!(processed.ticket.intent_category, IntentCategory::Other);
    assert!(processed.ticket.caller_name.is_none());

    match processed.outcome {
        AnalysisOutcome::Fallback {
            error,
            raw_response,
        } => {
            assert!(error.contains("department"));
            assert!(raw_response.unwrap().contains("Finance"));
        }
        other => panic!("expected fallback, got {:?}", other),
    }
}

#[tokio::test]
async fn test_transcription_failure_creates_no_ticket() {
    let temp = TempDir::new().unwrap();
    let speech = StubSpeech::failing(401);
    let language = StubLanguage::replying(VALID_ANALYSIS);
    let pipeline = pipeline(&temp, speech.clone(), language.clone());

    let err = pipeline
        .process_upload(b"fake", Some("call.mp3"), None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Transcription(TranscriptionError::Model(ModelError::Api { code: 401, .. }))
    ));
    assert_eq!(pipeline.store().count().unwrap(), 0);
    assert_eq!(*language.calls.lock().unwrap(), 0);

    // Cleanup runs on the error path too
    let seen = speech.seen();
    assert_eq!(seen.len(), 1);
    assert!(!seen[0].exists());
}

#[tokio::test]
async fn test_unsupported_upload_is_rejected_before_staging() {
    let temp = TempDir::new().unwrap();
    let speech = StubSpeech::replying("unused");
    let pipeline = pipeline(&temp, speech.clone(), StubLanguage::replying(VALID_ANALYSIS));

    let err = pipeline
        .process_upload(b"fake", Some("call.flac"), Some("audio/flac"))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Audio(AudioError::UnsupportedFormat(_))));
    assert!(speech.seen().is_empty());
    assert_eq!(pipeline.store().count().unwrap(), 0);
}

#[tokio::test]
async fn test_process_call_on_disk_keeps_the_file() {
    let temp = TempDir::new().unwrap();
    let audio = temp.path().join("front-desk.m4a");
    std::fs::write(&audio, b"fake").unwrap();

    let pipeline = pipeline(
        &temp,
        StubSpeech::replying("I need to reschedule my appointment"),
        StubLanguage::replying(VALID_ANALYSIS),
    );

    let first = pipeline.process_call(&audio).await.unwrap();
    let second = pipeline.process_call(&audio).await.unwrap();

    assert!(audio.exists());
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(second.ticket.id, first.ticket.id + 1);

    let ids: Vec<_> = pipeline.store().fetch_recent(5).unwrap().iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![second.ticket.id, first.ticket.id]);
}

#[tokio::test]
async fn test_processed_call_serializes_for_presentation() {
    let temp = TempDir::new().unwrap();
    let pipeline = pipeline(
        &temp,
        StubSpeech::replying("hello"),
        StubLanguage::replying(VALID_ANALYSIS),
    );

    let processed = pipeline
        .process_upload(b"fake", Some("call.wav"), None)
        .await
        .unwrap();
    let value = serde_json::to_value(&processed).unwrap();

    assert_eq!(value["outcome"]["status"], "validated");
    assert_eq!(value["ticket"]["department"], "Billing");
    assert_eq!(value["ticket"]["intent_category"], "billing_issue");
    assert_eq!(value["run_id"], processed.run_id.to_string());
}
