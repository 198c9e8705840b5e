//! Storage layer for situation replay.
//!
//! Provides an append-only SQLite event log that implements
//! [`sr_core::EventStore`].
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` instance can be moved between threads but cannot be shared across
//! threads without external synchronization. Parallel replays should open one
//! `Database` per worker.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 format with millisecond precision and a
//! `Z` suffix (e.g., `2025-01-15T10:30:00.000Z`). Every write goes through the same
//! formatter, so lexicographic ordering matches chronological ordering and range
//! queries can use the `(timestamp, seq)` index directly.
//!
//! ## Event Payload Storage
//!
//! The `type` column stores the event type (e.g., `boundary_start`) and the `data`
//! column stores the JSON of the event kind. The type column is checked before the
//! payload is decoded, so rows written by a newer version with an unknown type surface
//! as [`DbError::UnknownEventType`] instead of a generic decode failure.
//!
//! ## Iteration
//!
//! Forward and backward iteration read fixed-size pages keyed by a
//! `(timestamp, seq)` cursor. No statement is held open between pages, so an
//! iterator only borrows the connection and memory use is bounded by the page size.

use std::collections::VecDeque;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use thiserror::Error;

use sr_core::{
    Event, EventId, EventIter, EventKind, EventStore, EventType, StoreError, UnknownEventType,
};

/// Default number of rows fetched per page during iteration.
pub const DEFAULT_PAGE_SIZE: usize = 256;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// An event with the same link is already stored.
    #[error("duplicate event link: {0}")]
    DuplicateLink(EventId),
    /// Failed to parse an event timestamp.
    #[error("invalid timestamp for event {event_id}: {timestamp}")]
    TimestampParse {
        event_id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// Failed to parse event payload JSON or the payload disagrees with its type.
    #[error("invalid event data for {event_id}: {message}")]
    InvalidEventData { event_id: String, message: String },
    /// The stored type is not one this version understands.
    #[error("event {event_id} has {source}")]
    UnknownEventType {
        event_id: String,
        #[source]
        source: UnknownEventType,
    },
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Sqlite(source) => Self::Access {
                message: source.to_string(),
                source: Box::new(source),
            },
            DbError::DuplicateLink(link) => Self::DuplicateLink(link),
            DbError::UnknownEventType { source, .. } => Self::UnknownEventKind(source),
            DbError::TimestampParse { ref event_id, .. }
            | DbError::InvalidEventData { ref event_id, .. } => Self::Corrupt {
                link: event_id.clone(),
                message: err.to_string(),
            },
        }
    }
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
    page_size: usize,
}

/// A stored row before decoding.
#[derive(Debug, Clone)]
struct EventRow {
    seq: i64,
    id: String,
    timestamp: String,
    kind: String,
    data: String,
}

impl EventRow {
    const COLUMNS: &'static str = "seq, id, timestamp, type, data";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            seq: row.get(0)?,
            id: row.get(1)?,
            timestamp: row.get(2)?,
            kind: row.get(3)?,
            data: row.get(4)?,
        })
    }

    fn decode(self) -> Result<Event, DbError> {
        let event_type: EventType = self.kind.parse().map_err(|source| DbError::UnknownEventType {
            event_id: self.id.clone(),
            source,
        })?;
        let timestamp = parse_timestamp(&self.timestamp, &self.id)?;
        let kind: EventKind =
            serde_json::from_str(&self.data).map_err(|err| DbError::InvalidEventData {
                event_id: self.id.clone(),
                message: err.to_string(),
            })?;
        if kind.event_type() != event_type {
            return Err(DbError::InvalidEventData {
                event_id: self.id,
                message: format!(
                    "payload type {} does not match column type {event_type}",
                    kind.event_type()
                ),
            });
        }
        let id = EventId::new(self.id).map_err(|err| DbError::InvalidEventData {
            event_id: String::new(),
            message: err.to_string(),
        })?;
        Ok(Event::new(id, timestamp, kind))
    }
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn,
            page_size: DEFAULT_PAGE_SIZE,
        };
        db.init()?;
        tracing::debug!(path = %path.display(), "opened event database");
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn,
            page_size: DEFAULT_PAGE_SIZE,
        };
        db.init()?;
        Ok(db)
    }

    /// Sets how many rows iteration fetches per query. Values below 1 are raised to 1.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- Events table: the append-only situation log
            -- seq: insertion order, breaks ties between equal timestamps
            -- timestamp: RFC 3339 with milliseconds (e.g., '2025-01-15T10:30:00.000Z')
            -- type: event type (e.g., 'boundary_start')
            -- data: JSON of the event kind
            CREATE TABLE IF NOT EXISTS events (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                timestamp TEXT NOT NULL,
                type TEXT NOT NULL,
                data TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp, seq);
            ",
        )?;
        Ok(())
    }

    /// Appends a single event.
    ///
    /// Fails with [`DbError::DuplicateLink`] if the link is already stored.
    pub fn append(&mut self, event: &Event) -> Result<(), DbError> {
        let data = encode_kind(event)?;
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO events (id, timestamp, type, data) VALUES (?, ?, ?, ?)",
            params![
                event.id.as_str(),
                format_timestamp(event.timestamp),
                event.event_type().to_string(),
                data,
            ],
        )?;
        if inserted == 0 {
            return Err(DbError::DuplicateLink(event.id.clone()));
        }
        tracing::trace!(event = %event.id, kind = %event.event_type(), "appended event");
        Ok(())
    }

    /// Appends a batch of events in one transaction, ignoring duplicates by link.
    ///
    /// Returns how many events were inserted.
    pub fn append_all(&mut self, events: &[Event]) -> Result<usize, DbError> {
        if events.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO events (id, timestamp, type, data) VALUES (?, ?, ?, ?)",
            )?;
            for event in events {
                inserted += stmt.execute(params![
                    event.id.as_str(),
                    format_timestamp(event.timestamp),
                    event.event_type().to_string(),
                    encode_kind(event)?,
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(inserted, total = events.len(), "appended event batch");
        Ok(inserted)
    }

    /// Lists events ordered by time.
    ///
    /// The range is inclusive of `after` and exclusive of `before`.
    pub fn list_events(
        &self,
        after: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<Event>, DbError> {
        let after = after.map(format_timestamp);
        let before = before.map(format_timestamp);
        let mut stmt = self.conn.prepare(&format!(
            "
            SELECT {}
            FROM events
            WHERE (?1 IS NULL OR timestamp >= ?1) AND (?2 IS NULL OR timestamp < ?2)
            ORDER BY timestamp ASC, seq ASC
            ",
            EventRow::COLUMNS
        ))?;
        let rows = stmt.query_map(params![after, before], EventRow::from_row)?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?.decode()?);
        }
        Ok(events)
    }

    /// Counts stored events.
    pub fn count_events(&self) -> Result<u64, DbError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn fetch_page(&self, cursor: &Cursor) -> Result<Vec<EventRow>, DbError> {
        let sql = match cursor.direction {
            Direction::Forward => format!(
                "
                SELECT {}
                FROM events
                WHERE timestamp > ?1 OR (timestamp = ?1 AND seq > ?2)
                ORDER BY timestamp ASC, seq ASC
                LIMIT ?3
                ",
                EventRow::COLUMNS
            ),
            Direction::Backward => format!(
                "
                SELECT {}
                FROM events
                WHERE timestamp < ?1 OR (timestamp = ?1 AND seq < ?2)
                ORDER BY timestamp DESC, seq DESC
                LIMIT ?3
                ",
                EventRow::COLUMNS
            ),
        };
        let limit = i64::try_from(self.page_size).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![cursor.timestamp, cursor.seq, limit], EventRow::from_row)?;
        let mut page = Vec::with_capacity(self.page_size);
        for row in rows {
            page.push(row?);
        }
        tracing::trace!(direction = ?cursor.direction, rows = page.len(), "fetched event page");
        Ok(page)
    }
}

impl EventStore for Database {
    fn iter_from(&self, point: Option<DateTime<Utc>>) -> EventIter<'_> {
        // The empty string sorts before every formatted timestamp.
        let timestamp = point.map(format_timestamp).unwrap_or_default();
        Box::new(PagedEvents::new(
            self,
            Cursor {
                direction: Direction::Forward,
                timestamp,
                seq: -1,
            },
        ))
    }

    fn iter_before(&self, point: DateTime<Utc>) -> EventIter<'_> {
        Box::new(PagedEvents::new(
            self,
            Cursor {
                direction: Direction::Backward,
                timestamp: format_timestamp(point),
                seq: i64::MIN,
            },
        ))
    }

    fn load(&self, link: &EventId) -> Result<Event, StoreError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM events WHERE id = ?", EventRow::COLUMNS),
                [link.as_str()],
                EventRow::from_row,
            )
            .optional()
            .map_err(DbError::from)?;
        let row = row.ok_or_else(|| StoreError::NotFound(link.clone()))?;
        Ok(row.decode()?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// Position just past the last row handed out, in iteration order.
#[derive(Debug, Clone)]
struct Cursor {
    direction: Direction,
    timestamp: String,
    seq: i64,
}

/// Lazily pages through the event log in one direction.
struct PagedEvents<'a> {
    db: &'a Database,
    cursor: Cursor,
    buffer: VecDeque<EventRow>,
    exhausted: bool,
}

impl<'a> PagedEvents<'a> {
    const fn new(db: &'a Database, cursor: Cursor) -> Self {
        Self {
            db,
            cursor,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }
}

impl Iterator for PagedEvents<'_> {
    type Item = Result<Event, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            match self.db.fetch_page(&self.cursor) {
                Ok(page) => {
                    self.exhausted = page.len() < self.db.page_size;
                    if let Some(last) = page.last() {
                        self.cursor.timestamp.clone_from(&last.timestamp);
                        self.cursor.seq = last.seq;
                    }
                    self.buffer.extend(page);
                }
                Err(err) => {
                    self.exhausted = true;
                    return Some(Err(err.into()));
                }
            }
        }
        let row = self.buffer.pop_front()?;
        Some(row.decode().map_err(StoreError::from))
    }
}

fn encode_kind(event: &Event) -> Result<String, DbError> {
    serde_json::to_string(&event.kind).map_err(|err| DbError::InvalidEventData {
        event_id: event.id.to_string(),
        message: err.to_string(),
    })
}

fn parse_timestamp(timestamp: &str, event_id: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            event_id: event_id.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

/// Formats a timestamp the way every stored timestamp is written.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
