//! Errors surfaced by situation replay.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::event_type::UnknownEventType;
use crate::store::StoreError;
use crate::types::EventId;

/// Fatal replay errors.
///
/// None of these are retried. Situations yielded before the error remain valid.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Reading from the event store failed.
    #[error(transparent)]
    Store(StoreError),

    /// The log contains an event kind the replay engine cannot interpret.
    #[error(transparent)]
    UnknownEventKind(UnknownEventType),

    /// The query window ends before it starts.
    #[error("invalid window: end {end} is before start {start}")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// A boundary event was applied as a mutation.
    #[error("event {0} starts a situation and cannot mutate one")]
    NotAMutation(EventId),

    /// A mutation event was used to open a situation.
    #[error("event {0} does not start a situation")]
    NotABoundary(EventId),
}

impl From<StoreError> for ReplayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownEventKind(unknown) => Self::UnknownEventKind(unknown),
            other => Self::Store(other),
        }
    }
}
