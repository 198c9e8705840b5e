//! Immutable records in the situation log.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::event_type::EventType;
use crate::types::{EventId, SituationKind};

/// A timestamped entry in the append-only log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// The link identifying this event in its store.
    pub id: EventId,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// What the event does to the situation timeline.
    pub kind: EventKind,
}

/// Sub-second digits kept in event timestamps.
pub const TIMESTAMP_PRECISION: u16 = 3;

impl Event {
    /// Creates an event, truncating its timestamp to millisecond precision.
    pub fn new(id: EventId, timestamp: DateTime<Utc>, kind: EventKind) -> Self {
        Self {
            id,
            timestamp,
            kind,
        }
        .normalized()
    }

    /// Truncates the timestamp to the precision stores keep.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.timestamp = self.timestamp.trunc_subsecs(TIMESTAMP_PRECISION);
        self
    }

    /// Returns the canonical type of this event.
    pub const fn event_type(&self) -> EventType {
        self.kind.event_type()
    }

    /// Returns the situation kind this event opens, if it is a boundary.
    pub fn boundary(&self) -> Option<SituationKind> {
        match &self.kind {
            EventKind::BoundaryStart { situation } => Some(*situation),
            _ => None,
        }
    }
}

/// The effect an event has.
///
/// A boundary closes the open situation and starts a new one; every other
/// variant mutates the open situation without changing its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Starts a new situation of the given kind.
    BoundaryStart { situation: SituationKind },
    /// Adds a tag to the open situation.
    TagAdd { tag: String },
    /// Removes a tag from the open situation.
    TagRemove { tag: String },
    /// Appends a free-form note to the open situation.
    Note { text: String },
    /// Moves the open situation's start earlier.
    TimeAdjust { start: DateTime<Utc> },
}

impl EventKind {
    /// Returns the canonical type of this kind.
    pub const fn event_type(&self) -> EventType {
        match self {
            Self::BoundaryStart { .. } => EventType::BoundaryStart,
            Self::TagAdd { .. } => EventType::TagAdd,
            Self::TagRemove { .. } => EventType::TagRemove,
            Self::Note { .. } => EventType::Note,
            Self::TimeAdjust { .. } => EventType::TimeAdjust,
        }
    }
}
