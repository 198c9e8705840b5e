//! Situations: contiguous intervals of work or break.
//!
//! An [`OpenSituation`] is the single mutable situation under construction during
//! replay. Closing it consumes the builder and produces an immutable
//! [`Situation`]. Replay may still pull a closed situation's end back before
//! yielding it, but a yielded situation is never touched again.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::Serialize;

use crate::error::ReplayError;
use crate::event::{Event, EventKind};
use crate::types::{EventId, SituationKind, ValidationError};

/// Granularity that event-derived boundaries are snapped to.
///
/// Starts round down and ends round up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundPolicy(Duration);

impl RoundPolicy {
    /// Creates a rounding policy; the granularity must be positive.
    pub fn new(granularity: Duration) -> Result<Self, ValidationError> {
        if granularity <= Duration::zero() {
            return Err(ValidationError::NonPositiveGranularity {
                millis: granularity.num_milliseconds(),
            });
        }
        Ok(Self(granularity))
    }

    pub const fn granularity(self) -> Duration {
        self.0
    }

    /// Snaps a timestamp down to the granularity.
    ///
    /// Timestamps that cannot be represented after rounding are returned unchanged.
    pub fn floor(self, ts: DateTime<Utc>) -> DateTime<Utc> {
        ts.duration_trunc(self.0).unwrap_or(ts)
    }

    /// Snaps a timestamp up to the granularity.
    pub fn ceil(self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let floor = self.floor(ts);
        if floor == ts {
            return ts;
        }
        floor.checked_add_signed(self.0).unwrap_or(ts)
    }
}

/// The situation currently being replayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSituation {
    kind: SituationKind,
    start: DateTime<Utc>,
    /// Lowest value `start` may be adjusted to.
    floor: Option<DateTime<Utc>>,
    tags: BTreeSet<String>,
    notes: Vec<String>,
}

impl OpenSituation {
    /// Opens a situation from a boundary event.
    pub fn open_from(event: &Event, round: Option<RoundPolicy>) -> Result<Self, ReplayError> {
        let Some(kind) = event.boundary() else {
            return Err(ReplayError::NotABoundary(event.id.clone()));
        };
        let start = round.map_or(event.timestamp, |r| r.floor(event.timestamp));
        Ok(Self::new(kind, start))
    }

    /// Opens a situation that no boundary event produced.
    pub const fn new(kind: SituationKind, start: DateTime<Utc>) -> Self {
        Self {
            kind,
            start,
            floor: None,
            tags: BTreeSet::new(),
            notes: Vec::new(),
        }
    }

    /// Sets the lower bound for `TimeAdjust`.
    #[must_use]
    pub const fn with_floor(mut self, floor: DateTime<Utc>) -> Self {
        self.floor = Some(floor);
        self
    }

    /// Clips `start` to be no earlier than `bound` and never adjusts below it.
    pub(crate) fn clip_to(&mut self, bound: DateTime<Utc>) {
        self.start = self.start.max(bound);
        self.floor = Some(self.floor.map_or(bound, |f| f.max(bound)));
    }

    pub const fn kind(&self) -> SituationKind {
        self.kind
    }

    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub const fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// Applies a mutation event.
    ///
    /// Boundary events are rejected; they close this situation instead.
    pub fn apply(&mut self, event: &Event) -> Result<(), ReplayError> {
        match &event.kind {
            EventKind::BoundaryStart { .. } => {
                return Err(ReplayError::NotAMutation(event.id.clone()));
            }
            EventKind::TagAdd { tag } => {
                self.tags.insert(tag.clone());
            }
            EventKind::TagRemove { tag } => {
                self.tags.remove(tag);
            }
            EventKind::Note { text } => self.notes.push(text.clone()),
            EventKind::TimeAdjust { start } => self.adjust_start(*start, &event.id),
        }
        tracing::trace!(event = %event.id, kind = %event.event_type(), "applied mutation");
        Ok(())
    }

    fn adjust_start(&mut self, requested: DateTime<Utc>, link: &EventId) {
        if requested > self.start {
            tracing::warn!(
                event = %link,
                %requested,
                start = %self.start,
                "ignoring time adjust that would move start later"
            );
            return;
        }
        let target = self.floor.map_or(requested, |floor| requested.max(floor));
        if target >= self.start {
            tracing::debug!(
                event = %link,
                %requested,
                start = %self.start,
                "time adjust is already at the earliest allowed start"
            );
            return;
        }
        self.start = target;
    }

    /// Closes the situation at an event-derived timestamp, rounding up.
    pub fn close(self, at: DateTime<Utc>, round: Option<RoundPolicy>) -> Situation {
        let end = round.map_or(at, |r| r.ceil(at));
        self.finish(end, false)
    }

    /// Closes the situation at the window end without rounding and marks it last.
    pub fn close_last(self, at: DateTime<Utc>) -> Situation {
        self.finish(at, true)
    }

    fn finish(self, end: DateTime<Utc>, is_last: bool) -> Situation {
        Situation {
            kind: self.kind,
            start: self.start,
            end: end.max(self.start),
            tags: self.tags,
            notes: self.notes,
            is_last,
        }
    }
}

/// A closed, immutable situation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Situation {
    kind: SituationKind,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    tags: BTreeSet<String>,
    notes: Vec<String>,
    is_last: bool,
}

impl Situation {
    pub const fn kind(&self) -> SituationKind {
        self.kind
    }

    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub const fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// Whether this situation was still open when the window ran out.
    pub const fn is_last(&self) -> bool {
        self.is_last
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Pulls `end` back to `at`, or drops the situation if nothing would remain.
    pub(crate) fn retract_to(mut self, at: DateTime<Utc>) -> Option<Self> {
        if at <= self.start {
            return None;
        }
        self.end = self.end.min(at);
        Some(self)
    }

    pub(crate) fn into_last(mut self) -> Self {
        self.is_last = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn event(minutes: i64, kind: EventKind) -> Event {
        Event::new(EventId::new(format!("e{minutes}")).unwrap(), at(minutes), kind)
    }

    fn quarter_hour() -> Option<RoundPolicy> {
        Some(RoundPolicy::new(Duration::minutes(15)).unwrap())
    }

    #[test]
    fn round_policy_rejects_non_positive() {
        assert!(RoundPolicy::new(Duration::zero()).is_err());
        assert!(RoundPolicy::new(Duration::minutes(-5)).is_err());
    }

    #[test]
    fn round_policy_floor_and_ceil() {
        let policy = quarter_hour().unwrap();
        assert_eq!(policy.floor(at(7)), at(0));
        assert_eq!(policy.ceil(at(7)), at(15));
        assert_eq!(policy.floor(at(15)), at(15));
        assert_eq!(policy.ceil(at(15)), at(15));
    }

    #[test]
    fn open_from_rounds_start_down() {
        let boundary = event(
            7,
            EventKind::BoundaryStart {
                situation: SituationKind::Work,
            },
        );
        let open = OpenSituation::open_from(&boundary, quarter_hour()).unwrap();
        assert_eq!(open.kind(), SituationKind::Work);
        assert_eq!(open.start(), at(0));
    }

    #[test]
    fn open_from_rejects_mutation() {
        let note = event(0, EventKind::Note { text: "x".into() });
        let err = OpenSituation::open_from(&note, None).unwrap_err();
        assert!(matches!(err, ReplayError::NotABoundary(_)));
    }

    #[test]
    fn tag_add_is_idempotent_and_remove_tolerates_absent() {
        let mut open = OpenSituation::new(SituationKind::Work, at(0));
        open.apply(&event(1, EventKind::TagAdd { tag: "x".into() }))
            .unwrap();
        open.apply(&event(2, EventKind::TagAdd { tag: "x".into() }))
            .unwrap();
        open.apply(&event(3, EventKind::TagRemove { tag: "y".into() }))
            .unwrap();
        assert_eq!(open.tags().iter().collect::<Vec<_>>(), ["x"]);

        open.apply(&event(4, EventKind::TagRemove { tag: "x".into() }))
            .unwrap();
        assert!(open.tags().is_empty());
    }

    #[test]
    fn notes_are_never_deduplicated() {
        let mut open = OpenSituation::new(SituationKind::Break, at(0));
        open.apply(&event(1, EventKind::Note { text: "tea".into() }))
            .unwrap();
        open.apply(&event(2, EventKind::Note { text: "tea".into() }))
            .unwrap();
        assert_eq!(open.notes(), ["tea", "tea"]);
    }

    #[test]
    fn time_adjust_only_moves_start_earlier() {
        let mut open = OpenSituation::new(SituationKind::Work, at(30));
        open.apply(&event(31, EventKind::TimeAdjust { start: at(40) }))
            .unwrap();
        assert_eq!(open.start(), at(30));

        open.apply(&event(32, EventKind::TimeAdjust { start: at(20) }))
            .unwrap();
        assert_eq!(open.start(), at(20));
    }

    #[test]
    fn time_adjust_is_bounded_by_floor() {
        let mut open = OpenSituation::new(SituationKind::Work, at(30)).with_floor(at(25));
        open.apply(&event(31, EventKind::TimeAdjust { start: at(10) }))
            .unwrap();
        assert_eq!(open.start(), at(25));
    }

    #[test]
    fn apply_rejects_boundary() {
        let mut open = OpenSituation::new(SituationKind::Work, at(0));
        let boundary = event(
            5,
            EventKind::BoundaryStart {
                situation: SituationKind::Break,
            },
        );
        let err = open.apply(&boundary).unwrap_err();
        assert!(matches!(err, ReplayError::NotAMutation(_)));
    }

    #[test]
    fn close_rounds_end_up_and_freezes() {
        let mut open = OpenSituation::new(SituationKind::Work, at(0));
        open.apply(&event(1, EventKind::TagAdd { tag: "deep".into() }))
            .unwrap();
        let closed = open.close(at(22), quarter_hour());
        assert_eq!(closed.end(), at(30));
        assert!(!closed.is_last());
        assert!(closed.tags().contains("deep"));
        assert_eq!(closed.duration(), Duration::minutes(30));
    }

    #[test]
    fn retract_pulls_end_back_or_drops() {
        let closed = OpenSituation::new(SituationKind::Break, at(10)).close(at(40), None);
        assert_eq!(closed.clone().retract_to(at(50)).unwrap().end(), at(40));
        assert_eq!(closed.clone().retract_to(at(25)).unwrap().end(), at(25));
        assert!(closed.retract_to(at(10)).is_none());
    }

    #[test]
    fn close_never_ends_before_start() {
        let open = OpenSituation::new(SituationKind::Break, at(10));
        let closed = open.close_last(at(5));
        assert_eq!(closed.start(), at(10));
        assert_eq!(closed.end(), at(10));
        assert!(closed.is_last());
    }
}
