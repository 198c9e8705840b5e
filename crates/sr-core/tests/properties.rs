//! Property-based tests for situation replay.
//!
//! Random logs of boundaries and mutations are replayed over random windows,
//! with and without rounding, and checked for tiling, determinism and
//! composability.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use sr_core::{
    Event, EventId, EventKind, FixedClock, MemoryStore, RoundPolicy, Situation, SituationKind,
    Sourcerer,
};

fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn build_log(raw: &[(i64, u8)]) -> Vec<Event> {
    let mut raw = raw.to_vec();
    raw.sort_by_key(|(offset, _)| *offset);
    raw.iter()
        .enumerate()
        .map(|(idx, (offset, selector))| {
            let kind = match selector {
                0 => EventKind::BoundaryStart {
                    situation: SituationKind::Work,
                },
                1 => EventKind::BoundaryStart {
                    situation: SituationKind::Break,
                },
                2 => EventKind::TagAdd {
                    tag: format!("t{}", idx % 3),
                },
                3 => EventKind::TagRemove {
                    tag: format!("t{}", idx % 3),
                },
                4 => EventKind::Note {
                    text: format!("note {idx}"),
                },
                _ => EventKind::TimeAdjust {
                    start: at(offset - i64::try_from(idx % 25).unwrap()),
                },
            };
            Event::new(EventId::new(format!("e{idx}")).unwrap(), at(*offset), kind)
        })
        .collect()
}

fn sourcerer(raw: &[(i64, u8)]) -> Sourcerer<MemoryStore, FixedClock> {
    let store = MemoryStore::from_events(build_log(raw)).unwrap();
    Sourcerer::with_clock(store, FixedClock(at(10_000)))
}

fn intervals(situations: &[Situation]) -> Vec<(SituationKind, DateTime<Utc>, DateTime<Utc>)> {
    situations
        .iter()
        .map(|s| (s.kind(), s.start(), s.end()))
        .collect()
}

prop_compose! {
    fn arb_log()(raw in prop::collection::vec((0i64..240, 0u8..6), 0..40)) -> Vec<(i64, u8)> {
        raw
    }
}

prop_compose! {
    /// Logs without `TimeAdjust`, whose effect reaches back across a window split.
    fn arb_log_without_adjust()(raw in prop::collection::vec((0i64..240, 0u8..5), 0..40)) -> Vec<(i64, u8)> {
        raw
    }
}

fn arb_round() -> impl Strategy<Value = Option<RoundPolicy>> {
    prop::option::of(1i64..30).prop_map(|minutes| {
        minutes.map(|m| RoundPolicy::new(Duration::minutes(m)).unwrap())
    })
}

proptest! {
    /// Property: situations tile the window exactly, with or without rounding
    #[test]
    fn situations_tile_the_window(
        raw in arb_log(),
        start in 0i64..260,
        len in 1i64..120,
        round in arb_round(),
    ) {
        let sourcerer = sourcerer(&raw);
        let situations = sourcerer.replay(Some(at(start)), Some(at(start + len)), round).unwrap();

        prop_assert!(!situations.is_empty());
        prop_assert_eq!(situations[0].start(), at(start));
        prop_assert_eq!(situations.last().unwrap().end(), at(start + len));
        for pair in situations.windows(2) {
            prop_assert_eq!(pair[0].end(), pair[1].start());
            prop_assert!(!pair[0].is_last());
        }
        prop_assert!(situations.last().unwrap().is_last());
        prop_assert!(situations.iter().all(|s| s.start() < s.end()));
    }

    /// Property: replaying twice yields identical sequences
    #[test]
    fn replay_is_deterministic(
        raw in arb_log(),
        start in 0i64..260,
        len in 1i64..120,
        round in arb_round(),
    ) {
        let sourcerer = sourcerer(&raw);
        let first = sourcerer.replay(Some(at(start)), Some(at(start + len)), round).unwrap();
        let second = sourcerer.replay(Some(at(start)), Some(at(start + len)), round).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Property: splitting a window only splits the situation spanning the cut
    #[test]
    fn adjacent_windows_compose(raw in arb_log_without_adjust(), a in 0i64..260, b in 1i64..100, c in 1i64..100) {
        let (start, mid, end) = (at(a), at(a + b), at(a + b + c));
        let sourcerer = sourcerer(&raw);

        let whole = sourcerer.replay(Some(start), Some(end), None).unwrap();
        let mut parts = sourcerer.replay(Some(start), Some(mid), None).unwrap();
        parts.extend(sourcerer.replay(Some(mid), Some(end), None).unwrap());

        let expected: Vec<_> = intervals(&whole)
            .into_iter()
            .flat_map(|(kind, s, e)| {
                if s < mid && mid < e {
                    vec![(kind, s, mid), (kind, mid, e)]
                } else {
                    vec![(kind, s, e)]
                }
            })
            .collect();
        prop_assert_eq!(intervals(&parts), expected);
    }

    /// Property: an open start begins at the first logged event
    #[test]
    fn open_start_begins_at_first_event(raw in arb_log()) {
        prop_assume!(!raw.is_empty());
        let first = raw.iter().map(|(offset, _)| *offset).min().unwrap();
        let sourcerer = sourcerer(&raw);
        let situations = sourcerer.replay(None, None, None).unwrap();

        prop_assert_eq!(situations[0].start(), at(first));
        prop_assert_eq!(situations.last().unwrap().end(), at(10_000));
    }

    /// Property: without any boundary the whole window is a break
    #[test]
    fn no_boundaries_means_break(
        raw in prop::collection::vec((0i64..240, 2u8..6), 0..20),
        start in 0i64..260,
        len in 1i64..120,
    ) {
        let sourcerer = sourcerer(&raw);
        let situations = sourcerer.replay(Some(at(start)), Some(at(start + len)), None).unwrap();
        prop_assert_eq!(situations.len(), 1);
        prop_assert_eq!(situations[0].kind(), SituationKind::Break);
    }
}

#[test]
fn duplicate_tag_add_appears_once() {
    let mut store = MemoryStore::new();
    store
        .append(Event::new(
            EventId::new("w").unwrap(),
            at(0),
            EventKind::BoundaryStart {
                situation: SituationKind::Work,
            },
        ))
        .unwrap();
    for id in ["a", "b"] {
        store
            .append(Event::new(
                EventId::new(id).unwrap(),
                at(5),
                EventKind::TagAdd { tag: "x".into() },
            ))
            .unwrap();
    }
    let sourcerer = Sourcerer::with_clock(store, FixedClock(at(60)));
    let situations = sourcerer.replay(Some(at(0)), Some(at(60)), None).unwrap();
    assert_eq!(situations.len(), 1);
    assert_eq!(situations[0].tags().len(), 1);
    assert!(situations[0].tags().contains("x"));
}
