//! Append-only ticket table backed by SQLite.
//!
//! Every operation opens its own connection and closes it when done; no
//! transaction spans two calls. Concurrent writers are serialized by SQLite's
//! file lock only.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use thiserror::Error;

use crate::domain::{Department, NewTicket, Priority, Ticket, Vocabulary};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tickets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL,
    caller_name TEXT,
    caller_contact TEXT,
    intent_category TEXT NOT NULL,
    department TEXT NOT NULL,
    priority TEXT NOT NULL,
    sentiment TEXT NOT NULL,
    transcript TEXT NOT NULL,
    summary_short TEXT NOT NULL,
    summary_full TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tickets_created ON tickets(created_at DESC, id DESC);
"#;

const SELECT_COLUMNS: &str = "SELECT id, created_at, caller_name, caller_contact, intent_category, \
     department, priority, sentiment, transcript, summary_short, summary_full FROM tickets";

const ORDER: &str = "ORDER BY created_at DESC, id DESC";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from the ticket store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ticket {0} not found")]
    NotFound(i64),

    #[error("Column {column} holds unexpected value '{value}'")]
    InvalidColumn { column: &'static str, value: String },
}

/// Optional narrowing for ticket listings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketFilter {
    pub department: Option<Department>,
    pub priority: Option<Priority>,

    /// Case-insensitive substring over caller name, intent, department and transcript
    pub search: Option<String>,
}

impl TicketFilter {
    pub fn is_empty(&self) -> bool {
        self.department.is_none()
            && self.priority.is_none()
            && self.search.as_deref().map_or(true, |s| s.trim().is_empty())
    }
}

/// SQLite-backed ticket table
#[derive(Debug, Clone)]
pub struct TicketStore {
    db_path: PathBuf,
}

impl TicketStore {
    /// Open (creating if needed) the database at `db_path` and ensure the schema
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let store = Self { db_path };
        store.init()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Create the schema if absent. Safe to call repeatedly.
    pub fn init(&self) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    /// Insert one ticket and return its id
    pub fn insert(&self, ticket: &NewTicket) -> Result<i64, StoreError> {
        let created_at = ticket
            .created_at
            .as_deref()
            .map(normalize_timestamp)
            .unwrap_or_else(now_timestamp);

        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO tickets (
                created_at, caller_name, caller_contact, intent_category,
                department, priority, sentiment, transcript, summary_short, summary_full
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                created_at,
                ticket.caller_name,
                ticket.caller_contact,
                ticket.intent_category.as_str(),
                ticket.department.as_str(),
                ticket.priority.as_str(),
                ticket.sentiment.as_str(),
                ticket.transcript,
                ticket.summary_short,
                ticket.summary_full,
            ],
        )?;

        let id = conn.last_insert_rowid();
        tracing::debug!(ticket_id = id, %created_at, "Inserted ticket");

        Ok(id)
    }

    /// Look up a single ticket
    pub fn get(&self, id: i64) -> Result<Option<Ticket>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", SELECT_COLUMNS))?;
        let mut rows = stmt.query([id])?;

        match rows.next()? {
            Some(row) => Ok(Some(ticket_from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Up to `limit` tickets, newest first
    pub fn fetch_recent(&self, limit: usize) -> Result<Vec<Ticket>, StoreError> {
        self.fetch_filtered(&TicketFilter::default(), Some(limit))
    }

    /// Every ticket, newest first
    pub fn fetch_all(&self) -> Result<Vec<Ticket>, StoreError> {
        self.fetch_filtered(&TicketFilter::default(), None)
    }

    /// Tickets matching `filter`, newest first, optionally truncated
    pub fn fetch_filtered(
        &self,
        filter: &TicketFilter,
        limit: Option<usize>,
    ) -> Result<Vec<Ticket>, StoreError> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(department) = filter.department {
            clauses.push("department = ?");
            values.push(Value::Text(department.as_str().to_string()));
        }
        if let Some(priority) = filter.priority {
            clauses.push("priority = ?");
            values.push(Value::Text(priority.as_str().to_string()));
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            clauses.push(
                "(COALESCE(caller_name, '') LIKE ? ESCAPE '\\' \
                 OR intent_category LIKE ? ESCAPE '\\' \
                 OR department LIKE ? ESCAPE '\\' \
                 OR transcript LIKE ? ESCAPE '\\')",
            );
            let pattern = format!("%{}%", escape_like(search));
            values.extend(std::iter::repeat(Value::Text(pattern)).take(4));
        }

        let mut sql = SELECT_COLUMNS.to_string();
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push(' ');
        sql.push_str(ORDER);
        // Negative LIMIT means no limit in SQLite
        sql.push_str(" LIMIT ?");
        values.push(Value::Integer(
            limit.map_or(-1, |limit| i64::try_from(limit).unwrap_or(i64::MAX)),
        ));

        let conn = self.connect()?;
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(values.iter()))?;

        let mut tickets = Vec::new();
        while let Some(row) = rows.next()? {
            tickets.push(ticket_from_row(row)?);
        }

        Ok(tickets)
    }

    /// Total number of tickets
    pub fn count(&self) -> Result<u64, StoreError> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM tickets", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}

fn ticket_from_row(row: &Row<'_>) -> Result<Ticket, StoreError> {
    Ok(Ticket {
        id: row.get(0)?,
        created_at: row.get(1)?,
        caller_name: row.get(2)?,
        caller_contact: row.get(3)?,
        intent_category: vocabulary_column(row, 4)?,
        department: vocabulary_column(row, 5)?,
        priority: vocabulary_column(row, 6)?,
        sentiment: vocabulary_column(row, 7)?,
        transcript: row.get(8)?,
        summary_short: row.get(9)?,
        summary_full: row.get(10)?,
    })
}

fn vocabulary_column<V: Vocabulary>(row: &Row<'_>, idx: usize) -> Result<V, StoreError> {
    let value: String = row.get(idx)?;
    V::parse(&value).ok_or(StoreError::InvalidColumn {
        column: V::FIELD,
        value,
    })
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Naive ISO-8601 layouts, read as UTC
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Timestamps are stored in UTC so text order matches time order. RFC 3339
/// values are converted from their offset; naive date-times (no offset) are
/// taken to be UTC already. Anything else is stored as given.
fn normalize_timestamp(value: &str) -> String {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return ts
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Micros, true);
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive).to_rfc3339_opts(SecondsFormat::Micros, true))
        .unwrap_or_else(|| value.to_string())
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
