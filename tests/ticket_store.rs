//! Ticket Store Integration Tests
//!
//! Round-trip, ordering, filtering and idempotent initialization against a
//! real SQLite file.

use reception_agent::core::{TicketFilter, TicketStore};
use reception_agent::domain::{Department, IntentCategory, NewTicket, Priority, Sentiment};
use tempfile::TempDir;

fn store(temp: &TempDir) -> TicketStore {
    TicketStore::open(temp.path().join("tickets.db")).unwrap()
}

fn reschedule_ticket() -> NewTicket {
    NewTicket {
        created_at: None,
        caller_name: None,
        caller_contact: None,
        intent_category: IntentCategory::Appointment,
        department: Department::Administration,
        priority: Priority::Medium,
        sentiment: Sentiment::Neutral,
        transcript: "I need to reschedule my appointment".to_string(),
        summary_short: "Caller wants to reschedule".to_string(),
        summary_full: "Caller called to reschedule an appointment next week.".to_string(),
    }
}

fn ticket(
    transcript: &str,
    department: Department,
    priority: Priority,
    created_at: &str,
) -> NewTicket {
    NewTicket {
        transcript: transcript.to_string(),
        department,
        priority,
        ..reschedule_ticket()
    }
    .with_created_at(created_at)
}

#[test]
fn test_reschedule_scenario() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);
    let new = reschedule_ticket();

    let id = store.insert(&new).unwrap();
    assert_eq!(id, 1);
    assert_eq!(store.count().unwrap(), 1);

    let recent = store.fetch_recent(5).unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].id, 1);
    assert!(recent[0].matches(&new));
    assert!(!recent[0].created_at.is_empty());
}

#[test]
fn test_round_trip_preserves_fields() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);

    let new = NewTicket {
        caller_name: Some("Dana Whitfield".to_string()),
        caller_contact: Some("dana@example.com".to_string()),
        intent_category: IntentCategory::HrRequest,
        department: Department::Hr,
        priority: Priority::Critical,
        sentiment: Sentiment::Negative,
        transcript: String::new(),
        ..reschedule_ticket()
    };

    let id = store.insert(&new).unwrap();
    let fetched = store.get(id).unwrap().unwrap();

    assert!(fetched.matches(&new));
    assert_eq!(fetched.department, Department::Hr);
    assert_eq!(fetched.transcript, "");
    assert_eq!(store.fetch_all().unwrap(), vec![fetched]);
}

#[test]
fn test_get_missing_ticket() {
    let temp = TempDir::new().unwrap();
    assert!(store(&temp).get(42).unwrap().is_none());
}

#[test]
fn test_recent_is_newest_first_and_truncated() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);

    for (i, ts) in [
        "2024-05-01T09:00:00Z",
        "2024-05-01T10:00:00Z",
        "2024-05-01T11:00:00Z",
        "2024-05-01T12:00:00Z",
    ]
    .iter()
    .enumerate()
    {
        store
            .insert(&ticket(&format!("call {}", i), Department::Support, Priority::Low, ts))
            .unwrap();
    }

    let recent = store.fetch_recent(3).unwrap();
    let transcripts: Vec<_> = recent.iter().map(|t| t.transcript.as_str()).collect();
    assert_eq!(transcripts, vec!["call 3", "call 2", "call 1"]);

    let all = store.fetch_all().unwrap();
    assert_eq!(all.len(), 4);
    assert!(all.windows(2).all(|w| w[0].created_at > w[1].created_at));
}

#[test]
fn test_equal_timestamps_break_ties_by_id() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);
    let ts = "2024-05-01T09:00:00Z";

    let first = store
        .insert(&ticket("first", Department::Sales, Priority::Low, ts))
        .unwrap();
    let second = store
        .insert(&ticket("second", Department::Sales, Priority::Low, ts))
        .unwrap();

    let ids: Vec<_> = store.fetch_all().unwrap().iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![second, first]);
}

#[test]
fn test_offset_timestamps_are_normalized_to_utc() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);

    // 08:30 UTC, written with a +02:00 offset
    store
        .insert(&ticket("offset", Department::Billing, Priority::Low, "2024-05-01T10:30:00+02:00"))
        .unwrap();
    store
        .insert(&ticket("utc", Department::Billing, Priority::Low, "2024-05-01T09:00:00Z"))
        .unwrap();

    let all = store.fetch_all().unwrap();
    assert_eq!(all[0].transcript, "utc");
    assert_eq!(all[1].transcript, "offset");
    assert_eq!(all[1].created_at, "2024-05-01T08:30:00.000000Z");
}

#[test]
fn test_naive_timestamps_sort_with_utc_ones() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);

    store
        .insert(&ticket("naive", Department::Sales, Priority::Low, "2024-05-01T10:30:00.123456"))
        .unwrap();
    store
        .insert(&ticket("zulu", Department::Sales, Priority::Low, "2024-05-01T09:00:00Z"))
        .unwrap();

    let all = store.fetch_all().unwrap();
    assert_eq!(all[0].transcript, "naive");
    assert_eq!(all[0].created_at, "2024-05-01T10:30:00.123456Z");
    assert_eq!(all[1].transcript, "zulu");
}

#[test]
fn test_huge_limit_returns_everything() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);

    store.insert(&reschedule_ticket()).unwrap();
    store.insert(&reschedule_ticket()).unwrap();

    assert_eq!(store.fetch_recent(usize::MAX).unwrap().len(), 2);
    assert_eq!(store.fetch_recent(1).unwrap().len(), 1);
    assert!(store.fetch_recent(0).unwrap().is_empty());
    assert_eq!(store.fetch_filtered(&TicketFilter::default(), None).unwrap().len(), 2);
}

#[test]
fn test_init_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);
    store.insert(&reschedule_ticket()).unwrap();

    store.init().unwrap();
    store.init().unwrap();
    let reopened = TicketStore::open(store.path()).unwrap();

    assert_eq!(reopened.count().unwrap(), 1);
    assert_eq!(reopened.fetch_all().unwrap().len(), 1);
}

#[test]
fn test_open_creates_parent_directories() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("data").join("nested").join("tickets.db");

    let store = TicketStore::open(&path).unwrap();
    assert!(path.exists());
    assert_eq!(store.count().unwrap(), 0);
}

#[test]
fn test_filters() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);

    store
        .insert(&ticket("My invoice is wrong", Department::Billing, Priority::High, "2024-05-01T09:00:00Z"))
        .unwrap();
    store
        .insert(&ticket("Router keeps dropping", Department::Support, Priority::High, "2024-05-01T10:00:00Z"))
        .unwrap();
    store
        .insert(&ticket("Second INVOICE question", Department::Billing, Priority::Low, "2024-05-01T11:00:00Z"))
        .unwrap();

    let billing = store
        .fetch_filtered(
            &TicketFilter {
                department: Some(Department::Billing),
                ..Default::default()
            },
            None,
        )
        .unwrap();
    assert_eq!(billing.len(), 2);
    assert!(billing.iter().all(|t| t.department == Department::Billing));

    let high_billing = store
        .fetch_filtered(
            &TicketFilter {
                department: Some(Department::Billing),
                priority: Some(Priority::High),
                ..Default::default()
            },
            None,
        )
        .unwrap();
    assert_eq!(high_billing.len(), 1);
    assert_eq!(high_billing[0].transcript, "My invoice is wrong");

    let search = store
        .fetch_filtered(
            &TicketFilter {
                search: Some("invoice".to_string()),
                ..Default::default()
            },
            Some(1),
        )
        .unwrap();
    assert_eq!(search.len(), 1);
    assert_eq!(search[0].transcript, "Second INVOICE question");

    // Department names are searchable too
    let by_department_text = store
        .fetch_filtered(
            &TicketFilter {
                search: Some("support".to_string()),
                ..Default::default()
            },
            None,
        )
        .unwrap();
    assert_eq!(by_department_text.len(), 1);

    // LIKE wildcards are matched literally
    let wildcard = store
        .fetch_filtered(
            &TicketFilter {
                search: Some("%".to_string()),
                ..Default::default()
            },
            None,
        )
        .unwrap();
    assert!(wildcard.is_empty());
}
