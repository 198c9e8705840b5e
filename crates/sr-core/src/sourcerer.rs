//! Situation replay.
//!
//! [`Sourcerer::generate`] projects the event log onto a query window and yields
//! the situations that tile it, in order.
//!
//! # Algorithm Summary
//!
//! 1. Searching prior: rebuild the situation open at the window start by scanning
//!    backward to the nearest boundary and replaying the mutations after it.
//! 2. Active: walk events inside the window. A boundary closes the open situation
//!    and opens the next one; mutations apply to the open situation.
//! 3. Closing: when the window or the log runs out, close the open situation at
//!    the window end and mark it last.
//!
//! A closed situation is held back until the next boundary closes its successor.
//! Until then a `TimeAdjust` on the successor may pull the shared edge earlier,
//! down to the held situation's start.
//!
//! Events at or after the window end never take effect.

use std::vec;

use chrono::{DateTime, Utc};

use crate::clock::{Clock, SystemClock};
use crate::error::ReplayError;
use crate::event::Event;
use crate::situation::{OpenSituation, RoundPolicy, Situation};
use crate::store::{EventIter, EventStore};
use crate::types::SituationKind;

/// Kind assumed when no boundary precedes the window.
pub const DEFAULT_KIND: SituationKind = SituationKind::Break;

/// Replays situations from an event store.
#[derive(Debug, Clone)]
pub struct Sourcerer<S, C = SystemClock> {
    store: S,
    clock: C,
}

impl<S: EventStore> Sourcerer<S> {
    /// Creates a sourcerer that closes open-ended windows at the system time.
    pub const fn new(store: S) -> Self {
        Self {
            store,
            clock: SystemClock,
        }
    }
}

impl<S: EventStore, C: Clock> Sourcerer<S, C> {
    pub const fn with_clock(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Returns the situations overlapping `[start, end)`.
    ///
    /// With no `start` the window begins at the first logged event. With no
    /// `end` the window ends at the clock's now, read once here; an open-ended
    /// window that starts after now is empty. The returned iterator is lazy and
    /// stops after the first error.
    pub fn generate(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        round: Option<RoundPolicy>,
    ) -> Result<Situations<'_, S>, ReplayError> {
        let resolved_end = end.unwrap_or_else(|| self.clock.now());
        let phase = match start {
            Some(start) if resolved_end < start => {
                if let Some(end) = end {
                    return Err(ReplayError::InvalidWindow { start, end });
                }
                tracing::debug!(%start, now = %resolved_end, "open-ended window starts in the future");
                Phase::Done
            }
            Some(start) if resolved_end == start => Phase::Done,
            _ => Phase::SearchingPrior,
        };
        tracing::debug!(?start, end = %resolved_end, ?round, "replaying situations");
        Ok(Situations {
            store: &self.store,
            start,
            end: resolved_end,
            round,
            held: None,
            phase,
        })
    }

    /// Collects [`generate`](Self::generate) into a vector.
    pub fn replay(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        round: Option<RoundPolicy>,
    ) -> Result<Vec<Situation>, ReplayError> {
        self.generate(start, end, round)?.collect()
    }
}

enum Phase<'a> {
    SearchingPrior,
    Active {
        open: OpenSituation,
        events: EventIter<'a>,
    },
    Closing(OpenSituation),
    Draining(vec::IntoIter<Situation>),
    Done,
}

/// Lazy sequence of situations produced by [`Sourcerer::generate`].
pub struct Situations<'a, S> {
    store: &'a S,
    start: Option<DateTime<Utc>>,
    end: DateTime<Utc>,
    round: Option<RoundPolicy>,
    /// Closed situation not yet yielded; its end may still be pulled back.
    held: Option<Situation>,
    phase: Phase<'a>,
}

impl<'a, S: EventStore> Situations<'a, S> {
    /// Establishes the situation open at the window start.
    fn enter(&mut self) -> Result<Option<Phase<'a>>, ReplayError> {
        let store = self.store;
        let start = match self.start {
            Some(start) => start,
            None => {
                let Some(first) = store.first()? else {
                    tracing::debug!("event log is empty");
                    return Ok(None);
                };
                if self.end <= first.timestamp {
                    tracing::debug!(first = %first.timestamp, "window ends before the first event");
                    return Ok(None);
                }
                self.start = Some(first.timestamp);
                first.timestamp
            }
        };

        let open = self.reconstruct(start)?;
        Ok(Some(Phase::Active {
            open,
            events: store.iter_from(Some(start)),
        }))
    }

    /// Rebuilds the situation in effect at `start` from the events before it.
    fn reconstruct(&self, start: DateTime<Utc>) -> Result<OpenSituation, ReplayError> {
        let mut pending: Vec<Event> = Vec::new();
        let mut boundary = None;
        for event in self.store.iter_before(start) {
            let event = event?;
            if event.boundary().is_some() {
                boundary = Some(event);
                break;
            }
            pending.push(event);
        }

        let mut open = match boundary {
            Some(boundary) => {
                tracing::debug!(event = %boundary.id, at = %boundary.timestamp, "resuming from prior boundary");
                OpenSituation::open_from(&boundary, self.round)?
            }
            None => {
                tracing::debug!(%start, "no prior boundary; defaulting to {DEFAULT_KIND}");
                OpenSituation::new(DEFAULT_KIND, start)
            }
        };
        for event in pending.iter().rev() {
            open.apply(event)?;
        }
        open.clip_to(start);
        Ok(open)
    }

    /// Handles one event inside the window, returning the phase to continue in
    /// and a situation if one was released.
    fn step(
        &mut self,
        open: OpenSituation,
        event: &Event,
        events: EventIter<'a>,
    ) -> Result<(Phase<'a>, Option<Situation>), ReplayError> {
        if event.boundary().is_none() {
            let mut open = open;
            open.apply(event)?;
            self.held = self.held.take().and_then(|held| held.retract_to(open.start()));
            return Ok((Phase::Active { open, events }, None));
        }

        let mut next = OpenSituation::open_from(event, self.round)?;
        let closed = open.close(self.boundary_end(event.timestamp), None);
        if closed.duration().is_zero() {
            tracing::trace!(event = %event.id, at = %closed.start(), "dropping zero-width situation");
            next.clip_to(closed.start());
            if let Some(held) = &self.held {
                next = next.with_floor(held.start());
            }
            return Ok((Phase::Active { open: next, events }, None));
        }

        if closed.end() >= self.end {
            tracing::debug!(event = %event.id, "boundary rounds up to the window end");
            let mut tail: Vec<Situation> = self.held.take().into_iter().collect();
            tail.push(closed.into_last());
            return Ok((Phase::Draining(tail.into_iter()), None));
        }

        next.clip_to(closed.end());
        next = next.with_floor(closed.start());
        let released = self.held.replace(closed);
        Ok((Phase::Active { open: next, events }, released))
    }

    /// Where a boundary at `ts` ends the open situation: rounded up, never past the window.
    fn boundary_end(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        self.round.map_or(ts, |r| r.ceil(ts)).min(self.end)
    }

    /// Closes the open situation at the window end, after any held situation.
    fn finish(&mut self, open: OpenSituation) -> Phase<'a> {
        tracing::debug!(kind = %open.kind(), at = %self.end, "closing last situation");
        let last = open.close_last(self.end);
        let mut tail: Vec<Situation> = self.held.take().into_iter().collect();
        if last.duration().is_zero() {
            if let Some(held) = tail.pop() {
                tail.push(held.into_last());
            }
        } else {
            tail.push(last);
        }
        Phase::Draining(tail.into_iter())
    }
}

impl<S: EventStore> Iterator for Situations<'_, S> {
    type Item = Result<Situation, ReplayError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match std::mem::replace(&mut self.phase, Phase::Done) {
                Phase::SearchingPrior => match self.enter() {
                    Ok(Some(phase)) => self.phase = phase,
                    Ok(None) => return None,
                    Err(err) => return Some(Err(err)),
                },
                Phase::Active { open, mut events } => {
                    let event = match events.next() {
                        None => {
                            self.phase = Phase::Closing(open);
                            continue;
                        }
                        Some(Err(err)) => return Some(Err(err.into())),
                        Some(Ok(event)) => event,
                    };
                    if event.timestamp >= self.end {
                        tracing::trace!(event = %event.id, "reached window end");
                        self.phase = Phase::Closing(open);
                        continue;
                    }
                    match self.step(open, &event, events) {
                        Ok((phase, released)) => {
                            self.phase = phase;
                            if let Some(released) = released {
                                return Some(Ok(released));
                            }
                        }
                        Err(err) => return Some(Err(err)),
                    }
                }
                Phase::Closing(open) => self.phase = self.finish(open),
                Phase::Draining(mut tail) => {
                    let next = tail.next()?;
                    self.phase = Phase::Draining(tail);
                    return Some(Ok(next));
                }
                Phase::Done => return None,
            }
        }
    }
}
