//! Core domain logic for situation replay.
//!
//! This crate contains the fundamental types and logic for:
//! - Events: the immutable, timestamped records of the situation log
//! - Stores: ordered forward/backward access to the log
//! - Situations: contiguous intervals of work or break
//! - Replay: reconstructing the situations that tile a query window

mod clock;
mod error;
pub mod event;
pub mod event_type;
mod situation;
mod sourcerer;
pub mod store;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::ReplayError;
pub use event::{Event, EventKind};
pub use event_type::{EventType, UnknownEventType};
pub use situation::{OpenSituation, RoundPolicy, Situation};
pub use sourcerer::{DEFAULT_KIND, Situations, Sourcerer};
pub use store::{EventIter, EventStore, MemoryStore, StoreError};
pub use types::{EventId, SituationKind, ValidationError};
