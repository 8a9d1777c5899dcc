//! Storage layer for the health log.
//!
//! Provides persistence for days and settings using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` can be moved between threads but cannot be shared across threads
//! without external synchronization. Async callers share it as
//! `Arc<tokio::sync::Mutex<Database>>`.
//!
//! # Schema
//!
//! ## Dates
//!
//! Day keys are stored as TEXT in ISO 8601 calendar format (e.g., `2025-03-01`),
//! so lexicographic ordering matches chronological ordering.
//!
//! ## Payload Storage
//!
//! The `data` columns store JSON-encoded [`Day`] and [`Settings`] values.
//! Saving a day replaces the whole record. When evolving the payloads:
//! - Adding fields: give them serde defaults so old rows still load
//! - Removing or renaming fields: requires a migration

use std::path::Path;

use chrono::{NaiveDate, SecondsFormat, Utc};
use hl_core::{Day, DayStore, Settings};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored payload could not be encoded or decoded.
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    /// A stored day key is not a calendar date.
    #[error("invalid date key: {date}")]
    InvalidDate {
        date: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- Days table: one row per calendar day
            -- date: ISO 8601 date (e.g., '2025-03-01')
            -- data: JSON-encoded day record
            CREATE TABLE IF NOT EXISTS days (
                date TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Settings table: a single row with id = 1
            CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                data TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Returns the stored day for `date`, if any.
    pub fn day(&self, date: NaiveDate) -> Result<Option<Day>, DbError> {
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM days WHERE date = ?",
                [format_date(date)],
                |row| row.get(0),
            )
            .optional()?;
        data.map(|data| serde_json::from_str(&data).map_err(DbError::from))
            .transpose()
    }

    /// Writes `day`, replacing any existing record for its date.
    pub fn put_day(&self, day: &Day) -> Result<(), DbError> {
        let data = serde_json::to_string(day)?;
        self.conn.execute(
            "
            INSERT INTO days (date, data, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(date) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at
            ",
            params![format_date(day.date), data, now()],
        )?;
        tracing::trace!(date = %day.date, "saved day");
        Ok(())
    }

    /// Writes several days in one transaction.
    pub fn put_days(&mut self, days: &[Day]) -> Result<usize, DbError> {
        if days.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO days (date, data, updated_at) VALUES (?, ?, ?)
                ON CONFLICT(date) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at
                ",
            )?;
            let updated_at = now();
            for day in days {
                stmt.execute(params![
                    format_date(day.date),
                    serde_json::to_string(day)?,
                    updated_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(days.len())
    }

    /// Lists stored days within a date range, inclusive on both ends.
    pub fn list_days(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Day>, DbError> {
        if to < from {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(
            "
            SELECT date, data FROM days
            WHERE date >= ? AND date <= ?
            ORDER BY date ASC
            ",
        )?;
        let rows = stmt.query_map([format_date(from), format_date(to)], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut days = Vec::new();
        for row in rows {
            let (date, data) = row?;
            parse_date(&date)?;
            days.push(serde_json::from_str(&data)?);
        }
        Ok(days)
    }

    /// Returns the stored settings, if initialized.
    pub fn settings(&self) -> Result<Option<Settings>, DbError> {
        let data: Option<String> = self
            .conn
            .query_row("SELECT data FROM settings WHERE id = 1", [], |row| row.get(0))
            .optional()?;
        data.map(|data| serde_json::from_str(&data).map_err(DbError::from))
            .transpose()
    }

    /// Writes the settings row.
    pub fn put_settings(&self, settings: &Settings) -> Result<(), DbError> {
        let data = serde_json::to_string(settings)?;
        self.conn.execute(
            "
            INSERT INTO settings (id, data) VALUES (1, ?)
            ON CONFLICT(id) DO UPDATE SET data = excluded.data
            ",
            [data],
        )?;
        Ok(())
    }
}

impl DayStore for Database {
    type Error = DbError;

    fn fetch_day(&self, date: NaiveDate) -> Result<Option<Day>, DbError> {
        self.day(date)
    }

    fn fetch_or_create_day(&mut self, date: NaiveDate) -> Result<Day, DbError> {
        if let Some(day) = self.day(date)? {
            return Ok(day);
        }
        let day = Day::new(date);
        self.put_day(&day)?;
        tracing::debug!(%date, "created day");
        Ok(day)
    }

    fn save_day(&mut self, day: &Day) -> Result<(), DbError> {
        self.put_day(day)
    }

    fn fetch_days(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Day>, DbError> {
        self.list_days(from, to)
    }

    fn save_days(&mut self, days: &[Day]) -> Result<(), DbError> {
        let saved = self.put_days(days)?;
        tracing::debug!(saved, "saved days");
        Ok(())
    }

    fn fetch_settings(&self) -> Result<Option<Settings>, DbError> {
        self.settings()
    }

    fn save_settings(&mut self, settings: &Settings) -> Result<(), DbError> {
        self.put_settings(settings)
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_date(date: &str) -> Result<NaiveDate, DbError> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|source| DbError::InvalidDate {
        date: date.to_string(),
        source,
    })
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
