//! Ordered, append-only event storage.
//!
//! The replay engine only talks to storage through [`EventStore`]. Implementations
//! must yield events ordered by `(timestamp, insertion order)` and must never
//! reorder or duplicate events between calls on an unmodified store.
//!
//! [`MemoryStore`] keeps an ordered map keyed by `(timestamp, sequence)`, so
//! positioning at an arbitrary point is a logarithmic range lookup in either
//! direction.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::event::Event;
use crate::event_type::UnknownEventType;
use crate::types::EventId;

/// Errors raised while reading or writing a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No event exists for the given link.
    #[error("event not found: {0}")]
    NotFound(EventId),

    /// An event with this link is already stored.
    #[error("duplicate event link: {0}")]
    DuplicateLink(EventId),

    /// The stored event has a type the replay engine does not recognize.
    #[error(transparent)]
    UnknownEventKind(#[from] UnknownEventType),

    /// A stored event could not be decoded.
    #[error("corrupt event {link}: {message}")]
    Corrupt { link: String, message: String },

    /// The underlying storage failed.
    #[error("store access failed: {message}")]
    Access {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// A lazy sequence of events read from a store.
pub type EventIter<'a> = Box<dyn Iterator<Item = Result<Event, StoreError>> + 'a>;

/// Ordered, replayable access to the event log.
pub trait EventStore {
    /// Iterates forward over events with `timestamp >= point`.
    ///
    /// With `None` the iteration starts at the beginning of the log.
    fn iter_from(&self, point: Option<DateTime<Utc>>) -> EventIter<'_>;

    /// Iterates backward over events with `timestamp < point`, latest first.
    fn iter_before(&self, point: DateTime<Utc>) -> EventIter<'_>;

    /// Loads a single event by its link.
    fn load(&self, link: &EventId) -> Result<Event, StoreError>;

    /// Returns the earliest event in the log, if any.
    fn first(&self) -> Result<Option<Event>, StoreError> {
        self.iter_from(None).next().transpose()
    }
}

impl<S: EventStore + ?Sized> EventStore for &S {
    fn iter_from(&self, point: Option<DateTime<Utc>>) -> EventIter<'_> {
        (**self).iter_from(point)
    }

    fn iter_before(&self, point: DateTime<Utc>) -> EventIter<'_> {
        (**self).iter_before(point)
    }

    fn load(&self, link: &EventId) -> Result<Event, StoreError> {
        (**self).load(link)
    }
}

type IndexKey = (DateTime<Utc>, u64);

/// An in-memory store backed by an ordered timestamp index.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    events: BTreeMap<IndexKey, Event>,
    links: HashMap<EventId, IndexKey>,
    next_seq: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from events, appending them in the given order.
    pub fn from_events(events: impl IntoIterator<Item = Event>) -> Result<Self, StoreError> {
        let mut store = Self::new();
        for event in events {
            store.append(event)?;
        }
        Ok(store)
    }

    /// Appends an event.
    ///
    /// Timestamps are truncated to millisecond precision. Events sharing a
    /// timestamp keep their append order.
    pub fn append(&mut self, event: Event) -> Result<(), StoreError> {
        let event = event.normalized();
        if self.links.contains_key(&event.id) {
            return Err(StoreError::DuplicateLink(event.id));
        }
        let key = (event.timestamp, self.next_seq);
        self.next_seq += 1;
        self.links.insert(event.id.clone(), key);
        self.events.insert(key, event);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventStore for MemoryStore {
    fn iter_from(&self, point: Option<DateTime<Utc>>) -> EventIter<'_> {
        match point {
            Some(point) => Box::new(self.events.range((point, 0)..).map(|(_, e)| Ok(e.clone()))),
            None => Box::new(self.events.values().cloned().map(Ok)),
        }
    }

    fn iter_before(&self, point: DateTime<Utc>) -> EventIter<'_> {
        Box::new(
            self.events
                .range(..(point, 0))
                .rev()
                .map(|(_, e)| Ok(e.clone())),
        )
    }

    fn load(&self, link: &EventId) -> Result<Event, StoreError> {
        self.links
            .get(link)
            .and_then(|key| self.events.get(key))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(link.clone()))
    }
}
