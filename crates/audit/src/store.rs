//! Append-only SQLite event log doubling as the idempotency check.
//!
//! Every ingestion call that reaches a terminal decision appends exactly one
//! row to `events`; nothing ever updates or deletes. `seen` asks whether any
//! event exists for the same `(spreadsheet_id, sheet_name, row_index,
//! row_hash)` key, which is why an `error` event also suppresses resubmission
//! of the identical row.

use crate::error::{AuditError, Result};
use crate::fingerprint::RowFingerprint;
use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;
use sheetbridge_protocol::WatchedSource;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

const MAX_DETAIL_CHARS: usize = 2000;

const CREATE_EVENTS_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    spreadsheet_id TEXT NOT NULL,
    sheet_name TEXT NOT NULL,
    row_index INTEGER NOT NULL,
    row_hash TEXT NOT NULL,
    crm_id TEXT,
    action TEXT NOT NULL,
    detail TEXT NOT NULL DEFAULT '',
    ts TEXT NOT NULL
)
"#;

const CREATE_ROW_KEY_INDEX_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_events_row_key
ON events (spreadsheet_id, sheet_name, row_index, row_hash)
"#;

/// Terminal decision recorded for one ingested row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventAction {
    Duplicate,
    Skipped,
    Created,
    Updated,
    Error,
    Unknown,
}

impl EventAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::Skipped => "skipped",
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventAction {
    type Err = std::convert::Infallible;

    // Tolerant: rows written by other versions read back as Unknown.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "duplicate" => Self::Duplicate,
            "skipped" => Self::Skipped,
            "created" => Self::Created,
            "updated" => Self::Updated,
            "error" => Self::Error,
            _ => Self::Unknown,
        })
    }
}

/// One event to append. `crm_id` is None whenever no CRM object was involved.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub source: WatchedSource,
    pub row_index: u32,
    pub row_hash: RowFingerprint,
    pub crm_id: Option<String>,
    pub action: EventAction,
    pub detail: String,
}

/// Listing shape returned by [`AuditStore::recent`], mirroring the columns
/// the log endpoint exposes.
#[derive(Debug, Clone, Serialize)]
pub struct EventSummary {
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub row_index: u32,
    pub crm_id: Option<String>,
    pub action: EventAction,
    pub detail: String,
    pub ts: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AuditStore {
    pool: SqlitePool,
}

impl AuditStore {
    /// Open (creating if necessary) the event log at `path`. Parent
    /// directories are created as well.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        debug!("audit store opened at {}", path.display());

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Private per-instance database, used by tests and throwaway runs.
    pub async fn open_in_memory() -> Result<Self> {
        // One connection: every connection to :memory: is a separate database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(CREATE_EVENTS_SQL).execute(&self.pool).await?;
        sqlx::query(CREATE_ROW_KEY_INDEX_SQL)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Has any event (of any action) been recorded for this exact row key?
    pub async fn seen(
        &self,
        source: &WatchedSource,
        row_index: u32,
        row_hash: &RowFingerprint,
    ) -> Result<bool> {
        let row = sqlx::query(
            "SELECT 1 FROM events \
             WHERE spreadsheet_id = $1 AND sheet_name = $2 AND row_index = $3 AND row_hash = $4 \
             LIMIT 1",
        )
        .bind(&source.spreadsheet_id)
        .bind(&source.sheet_name)
        .bind(row_index)
        .bind(row_hash.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    /// Append one event. Detail text is truncated to 2000 characters.
    pub async fn record(&self, event: &AuditEvent) -> Result<()> {
        let detail = truncate_chars(&event.detail, MAX_DETAIL_CHARS);
        sqlx::query(
            "INSERT INTO events \
             (spreadsheet_id, sheet_name, row_index, row_hash, crm_id, action, detail, ts) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&event.source.spreadsheet_id)
        .bind(&event.source.sheet_name)
        .bind(event.row_index)
        .bind(event.row_hash.as_str())
        .bind(event.crm_id.as_deref())
        .bind(event.action.as_str())
        .bind(detail)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Newest events first, at most `limit` of them.
    pub async fn recent(&self, limit: u32) -> Result<Vec<EventSummary>> {
        let rows = sqlx::query(
            "SELECT spreadsheet_id, sheet_name, row_index, crm_id, action, detail, ts \
             FROM events ORDER BY id DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_summary).collect()
    }
}

fn row_to_summary(row: &SqliteRow) -> Result<EventSummary> {
    let ts: String = row.try_get("ts")?;
    let ts = DateTime::parse_from_rfc3339(&ts)
        .map_err(AuditError::Timestamp)?
        .with_timezone(&Utc);
    let action: String = row.try_get("action")?;
    let action = action.parse().unwrap_or(EventAction::Unknown);

    Ok(EventSummary {
        spreadsheet_id: row.try_get("spreadsheet_id")?,
        sheet_name: row.try_get("sheet_name")?,
        row_index: row.try_get("row_index")?,
        crm_id: row.try_get("crm_id")?,
        action,
        detail: row.try_get("detail")?,
        ts,
    })
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
