//! Wire names of event kinds.
//!
//! Storage keeps the type name in its own column so an unknown kind can be
//! reported before its payload is decoded.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Canonical event types in the situation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    BoundaryStart,
    TagAdd,
    TagRemove,
    Note,
    TimeAdjust,
}

impl EventType {
    pub const ALL: [Self; 5] = [
        Self::BoundaryStart,
        Self::TagAdd,
        Self::TagRemove,
        Self::Note,
        Self::TimeAdjust,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BoundaryStart => "boundary_start",
            Self::TagAdd => "tag_add",
            Self::TagRemove => "tag_remove",
            Self::Note => "note",
            Self::TimeAdjust => "time_adjust",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventType(s.to_string()))
    }
}

/// A stored type name this version does not recognize.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown event type: {0}")]
pub struct UnknownEventType(pub String);
