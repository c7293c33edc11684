//! Storage layer for the sleep logger.
//!
//! Provides persistence for raw events and aggregated sleep entries using
//! `rusqlite`, plus the entry lifecycle operations that tie the two
//! together.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but
//! not `Sync`. A `Database` instance can be moved between threads but cannot
//! be shared without external synchronization. The capture loop and the CLI
//! are both single-threaded, so each simply owns its connection.
//!
//! # Schema
//!
//! Timestamps are stored as TEXT in ISO 8601 format with millisecond
//! precision (e.g., `2024-03-01T22:30:00.000Z`), always UTC, so
//! lexicographic ordering matches chronological ordering. Event identifiers
//! are derived from the millisecond timestamp and order the same way.
//!
//! Records are typed at this boundary: rows are converted to and from
//! [`sleeplog_core::Event`] / [`sleeplog_core::Entry`] on every read and
//! write, and malformed rows surface as [`DbError::InvalidRecord`] rather
//! than leaking through as loose strings.

use std::path::Path;

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeDelta, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

use sleeplog_core::{Entry, Event, EventKind, SleepStats, StatsError, clean_events, compute_stats};

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A referenced record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    /// A malformed event range was passed to entry creation.
    #[error("invalid event range: {0}")]
    InvalidRange(String),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for {id}: {timestamp}")]
    TimestampParse {
        id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored row failed validation on read.
    #[error("invalid record {id}: {message}")]
    InvalidRecord { id: String, message: String },
    /// Statistics aggregation failed.
    #[error(transparent)]
    Stats(#[from] StatsError),
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
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS entries (
                id TEXT PRIMARY KEY,
                event_ids TEXT NOT NULL,
                in_bed_time TEXT,
                sleep_start_time TEXT,
                fall_asleep_time TEXT,
                first_awakening_time TEXT,
                wake_up_time TEXT,
                out_of_bed_time TEXT,
                time_in_bed_ms INTEGER,
                time_asleep_ms INTEGER NOT NULL DEFAULT 0,
                time_awakened_ms INTEGER NOT NULL DEFAULT 0,
                num_awakenings INTEGER NOT NULL DEFAULT 0,
                notes TEXT
            );

            -- Events table: one row per physical occurrence
            -- timestamp: ISO 8601 with millisecond precision, always UTC
            -- entry_id: back-reference to the entry that consumed the event
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL UNIQUE,
                type TEXT NOT NULL,
                entry_id TEXT,
                FOREIGN KEY (entry_id) REFERENCES entries(id) ON DELETE SET NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);
            CREATE INDEX IF NOT EXISTS idx_events_type ON events(type);
            CREATE INDEX IF NOT EXISTS idx_events_entry ON events(entry_id);
            ",
        )?;
        Ok(())
    }

    // ===== Events =====

    /// Inserts a single event.
    ///
    /// Fails if an event with the same identifier or timestamp already
    /// exists; timestamps are unique per event by design.
    pub fn insert_event(&self, event: &Event) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO events (id, timestamp, type, entry_id) VALUES (?, ?, ?, ?)",
            params![
                event.id.as_str(),
                format_timestamp(event.timestamp),
                event.kind.as_str(),
                event.entry_id,
            ],
        )?;
        Ok(())
    }

    /// Fetches a single event by identifier.
    pub fn get_event(&self, id: &str) -> Result<Event, DbError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, timestamp, type, entry_id FROM events WHERE id = ?",
                params![id],
                event_row,
            )
            .optional()?;
        match row {
            Some(row) => event_from_row(row),
            None => Err(DbError::NotFound {
                kind: "event",
                id: id.to_string(),
            }),
        }
    }

    /// Lists all events ordered by timestamp then ID.
    pub fn list_events(&self) -> Result<Vec<Event>, DbError> {
        self.query_events(
            "SELECT id, timestamp, type, entry_id FROM events
             ORDER BY timestamp ASC, id ASC",
            params![],
        )
    }

    /// Lists events within a time range, both bounds inclusive.
    pub fn list_events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Event>, DbError> {
        if end < start {
            return Ok(Vec::new());
        }
        self.query_events(
            "SELECT id, timestamp, type, entry_id FROM events
             WHERE timestamp >= ? AND timestamp <= ?
             ORDER BY timestamp ASC, id ASC",
            params![format_timestamp(start), format_timestamp(end)],
        )
    }

    /// Lists events not yet consumed by any entry.
    pub fn unconsumed_events(&self) -> Result<Vec<Event>, DbError> {
        self.query_events(
            "SELECT id, timestamp, type, entry_id FROM events
             WHERE entry_id IS NULL
             ORDER BY timestamp ASC, id ASC",
            params![],
        )
    }

    /// Lists the events consumed by the given entry.
    pub fn events_for_entry(&self, entry_id: &str) -> Result<Vec<Event>, DbError> {
        self.query_events(
            "SELECT id, timestamp, type, entry_id FROM events
             WHERE entry_id = ?
             ORDER BY timestamp ASC, id ASC",
            params![entry_id],
        )
    }

    fn query_events(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Event>, DbError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, event_row)?;
        let mut events = Vec::new();
        for row in rows {
            events.push(event_from_row(row?)?);
        }
        Ok(events)
    }

    /// Clears back-references that point at entries which no longer exist.
    ///
    /// Returns the number of events unlinked. Safety net for stores written
    /// by older revisions that deleted entries without unlinking first.
    pub fn reset_orphaned_events(&mut self) -> Result<usize, DbError> {
        let updated = self.conn.execute(
            "UPDATE events SET entry_id = NULL
             WHERE entry_id IS NOT NULL
               AND entry_id NOT IN (SELECT id FROM entries)",
            params![],
        )?;
        if updated > 0 {
            tracing::info!(count = updated, "reset orphaned event back-references");
        }
        Ok(updated)
    }

    // ===== Entries =====

    /// Fetches a single entry by its bedtime date identifier.
    pub fn get_entry(&self, id: &str) -> Result<Entry, DbError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, event_ids, in_bed_time, sleep_start_time, fall_asleep_time,
                        first_awakening_time, wake_up_time, out_of_bed_time,
                        time_in_bed_ms, time_asleep_ms, time_awakened_ms, num_awakenings, notes
                 FROM entries WHERE id = ?",
                params![id],
                entry_row,
            )
            .optional()?;
        match row {
            Some(row) => entry_from_row(row),
            None => Err(DbError::NotFound {
                kind: "entry",
                id: id.to_string(),
            }),
        }
    }

    /// Lists all entries ordered by date.
    pub fn list_entries(&self) -> Result<Vec<Entry>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, event_ids, in_bed_time, sleep_start_time, fall_asleep_time,
                    first_awakening_time, wake_up_time, out_of_bed_time,
                    time_in_bed_ms, time_asleep_ms, time_awakened_ms, num_awakenings, notes
             FROM entries ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], entry_row)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(entry_from_row(row?)?);
        }
        Ok(entries)
    }

    /// Updates an entry's free-text notes.
    pub fn set_entry_notes(&mut self, id: &str, notes: Option<&str>) -> Result<(), DbError> {
        let updated = self.conn.execute(
            "UPDATE entries SET notes = ? WHERE id = ?",
            params![notes, id],
        )?;
        if updated == 0 {
            return Err(DbError::NotFound {
                kind: "entry",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    // ===== Entry lifecycle =====

    /// Creates (or recomputes) the entry for one night of raw events.
    ///
    /// The range must be non-empty, strictly ordered by timestamp, and run
    /// from an `InBed` event to an `OutOfBed` event, otherwise
    /// [`DbError::InvalidRange`] is returned. The range is cleaned and
    /// aggregated, the entry is upserted under its derived bedtime date
    /// (overwriting the derived fields of any existing entry for that night
    /// while preserving its notes), and every raw event's back-reference is
    /// pointed at the entry. The whole operation runs in one transaction, so
    /// a failure leaves the store untouched.
    pub fn create_entry(
        &mut self,
        events: &[Event],
        min_sleep: TimeDelta,
        cutoff_hour: u32,
    ) -> Result<Entry, DbError> {
        validate_range(events)?;

        let cleaned = clean_events(events, min_sleep);
        let stats = compute_stats(&cleaned, cutoff_hour)?;
        let event_ids = events.iter().map(|event| event.id.clone()).collect();
        let entry = Entry::from_stats(stats, event_ids);
        let id = entry.id();

        let event_ids_json = serde_json::to_string(&entry.event_ids)
            .map_err(|err| DbError::InvalidRecord {
                id: id.clone(),
                message: err.to_string(),
            })?;

        let tx = self.conn.transaction()?;
        tx.execute(
            "
            INSERT INTO entries
            (id, event_ids, in_bed_time, sleep_start_time, fall_asleep_time,
             first_awakening_time, wake_up_time, out_of_bed_time,
             time_in_bed_ms, time_asleep_ms, time_awakened_ms, num_awakenings)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                event_ids = excluded.event_ids,
                in_bed_time = excluded.in_bed_time,
                sleep_start_time = excluded.sleep_start_time,
                fall_asleep_time = excluded.fall_asleep_time,
                first_awakening_time = excluded.first_awakening_time,
                wake_up_time = excluded.wake_up_time,
                out_of_bed_time = excluded.out_of_bed_time,
                time_in_bed_ms = excluded.time_in_bed_ms,
                time_asleep_ms = excluded.time_asleep_ms,
                time_awakened_ms = excluded.time_awakened_ms,
                num_awakenings = excluded.num_awakenings
            ",
            params![
                id,
                event_ids_json,
                entry.stats.in_bed_time.map(format_timestamp),
                entry.stats.sleep_start_time.map(format_timestamp),
                entry.stats.fall_asleep_time.map(format_timestamp),
                entry.stats.first_awakening_time.map(format_timestamp),
                entry.stats.wake_up_time.map(format_timestamp),
                entry.stats.out_of_bed_time.map(format_timestamp),
                entry.stats.time_in_bed_ms,
                entry.stats.time_asleep_ms,
                entry.stats.time_awakened_ms,
                entry.stats.num_awakenings,
            ],
        )?;

        // A recomputed night may consume a different range than before, so
        // detach whatever the previous revision linked before relinking.
        tx.execute(
            "UPDATE events SET entry_id = NULL WHERE entry_id = ?",
            params![id],
        )?;
        {
            let mut stmt = tx.prepare("UPDATE events SET entry_id = ? WHERE id = ?")?;
            for event in events {
                stmt.execute(params![id, event.id.as_str()])?;
            }
        }
        tx.commit()?;

        tracing::info!(entry = %id, events = events.len(), "created entry");
        Ok(entry)
    }

    /// Deletes an entry, unlinking all referencing events first.
    ///
    /// Returns the number of events unlinked. The unlink pass and the delete
    /// run in one transaction; an entry is never left behind with missing
    /// backing events.
    pub fn delete_entry(&mut self, id: &str) -> Result<usize, DbError> {
        let tx = self.conn.transaction()?;
        let unlinked = tx.execute(
            "UPDATE events SET entry_id = NULL WHERE entry_id = ?",
            params![id],
        )?;
        let deleted = tx.execute("DELETE FROM entries WHERE id = ?", params![id])?;
        if deleted == 0 {
            return Err(DbError::NotFound {
                kind: "entry",
                id: id.to_string(),
            });
        }
        tx.commit()?;

        tracing::info!(entry = %id, unlinked, "deleted entry");
        Ok(unlinked)
    }
}

/// Validates the shape of a raw event range for entry creation.
fn validate_range(events: &[Event]) -> Result<(), DbError> {
    let (Some(first), Some(last)) = (events.first(), events.last()) else {
        return Err(DbError::InvalidRange("empty event range".to_string()));
    };
    if first.kind != EventKind::InBed {
        return Err(DbError::InvalidRange(format!(
            "range must begin with in_bed, got {}",
            first.kind
        )));
    }
    if last.kind != EventKind::OutOfBed {
        return Err(DbError::InvalidRange(format!(
            "range must end with out_of_bed, got {}",
            last.kind
        )));
    }
    for pair in events.windows(2) {
        if pair[1].timestamp <= pair[0].timestamp {
            return Err(DbError::InvalidRange(format!(
                "events out of order at {}",
                pair[1].id
            )));
        }
    }
    Ok(())
}

type EventRow = (String, String, String, Option<String>);

fn event_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn event_from_row(row: EventRow) -> Result<Event, DbError> {
    let (id, timestamp, kind, entry_id) = row;
    let timestamp = parse_timestamp(&timestamp, &id)?;
    let kind: EventKind = kind.parse().map_err(|err: sleeplog_core::UnknownEventKind| {
        DbError::InvalidRecord {
            id: id.clone(),
            message: err.to_string(),
        }
    })?;
    Ok(Event {
        id: id.into(),
        timestamp,
        kind,
        entry_id,
    })
}

#[expect(clippy::type_complexity, reason = "flat SQL row tuple")]
type EntryRow = (
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<i64>,
    i64,
    i64,
    u32,
    Option<String>,
);

fn entry_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntryRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
        row.get(12)?,
    ))
}

fn entry_from_row(row: EntryRow) -> Result<Entry, DbError> {
    let (
        id,
        event_ids,
        in_bed_time,
        sleep_start_time,
        fall_asleep_time,
        first_awakening_time,
        wake_up_time,
        out_of_bed_time,
        time_in_bed_ms,
        time_asleep_ms,
        time_awakened_ms,
        num_awakenings,
        notes,
    ) = row;

    let date = NaiveDate::parse_from_str(&id, "%Y-%m-%d").map_err(|err| DbError::InvalidRecord {
        id: id.clone(),
        message: format!("bad entry date: {err}"),
    })?;
    let event_ids = serde_json::from_str(&event_ids).map_err(|err| DbError::InvalidRecord {
        id: id.clone(),
        message: format!("bad event id list: {err}"),
    })?;

    let stats = SleepStats {
        date,
        in_bed_time: parse_optional_timestamp(in_bed_time, &id)?,
        sleep_start_time: parse_optional_timestamp(sleep_start_time, &id)?,
        fall_asleep_time: parse_optional_timestamp(fall_asleep_time, &id)?,
        first_awakening_time: parse_optional_timestamp(first_awakening_time, &id)?,
        wake_up_time: parse_optional_timestamp(wake_up_time, &id)?,
        out_of_bed_time: parse_optional_timestamp(out_of_bed_time, &id)?,
        time_in_bed_ms,
        time_asleep_ms,
        time_awakened_ms,
        num_awakenings,
    };

    Ok(Entry {
        event_ids,
        stats,
        notes,
    })
}

fn parse_timestamp(timestamp: &str, id: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            id: id.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

fn parse_optional_timestamp(
    timestamp: Option<String>,
    id: &str,
) -> Result<Option<DateTime<Utc>>, DbError> {
    timestamp
        .map(|value| parse_timestamp(&value, id))
        .transpose()
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
