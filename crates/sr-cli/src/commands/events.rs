//! Events command for dumping the log as JSONL.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use sr_db::Database;

use crate::commands::util::parse_datetime;

#[derive(Debug, Args)]
pub struct EventsArgs {
    /// Only events at or after this time.
    #[arg(long)]
    pub after: Option<String>,
    /// Only events strictly before this time.
    #[arg(long)]
    pub before: Option<String>,
}

/// Writes matching events as JSONL, oldest first.
pub fn run<W: Write>(writer: &mut W, db: &Database, args: &EventsArgs) -> Result<usize> {
    let after = args.after.as_deref().map(parse_datetime).transpose()?;
    let before = args.before.as_deref().map(parse_datetime).transpose()?;

    let events = db.list_events(after, before)?;
    for event in &events {
        let json = serde_json::to_string(event)?;
        writeln!(writer, "{json}")?;
    }
    Ok(events.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{TimeZone, Utc};
    use insta::assert_snapshot;
    use sr_core::{Event, EventId, EventKind, SituationKind};

    fn seeded() -> Database {
        let mut db = Database::open_in_memory().unwrap();
        db.append_all(&[
            Event::new(
                EventId::new("w1").unwrap(),
                Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap(),
                EventKind::BoundaryStart {
                    situation: SituationKind::Work,
                },
            ),
            Event::new(
                EventId::new("t1").unwrap(),
                Utc.with_ymd_and_hms(2025, 1, 15, 9, 30, 0).unwrap(),
                EventKind::TagAdd { tag: "x".into() },
            ),
        ])
        .unwrap();
        db
    }

    #[test]
    fn events_dumps_jsonl() {
        let db = seeded();
        let mut output = Vec::new();
        let count = run(
            &mut output,
            &db,
            &EventsArgs {
                after: None,
                before: None,
            },
        )
        .unwrap();

        assert_eq!(count, 2);
        assert_snapshot!(String::from_utf8(output).unwrap(), @r#"
        {"id":"w1","timestamp":"2025-01-15T09:00:00Z","kind":{"type":"boundary_start","situation":"work"}}
        {"id":"t1","timestamp":"2025-01-15T09:30:00Z","kind":{"type":"tag_add","tag":"x"}}
        "#);
    }

    #[test]
    fn events_respects_range() {
        let db = seeded();
        let mut output = Vec::new();
        let count = run(
            &mut output,
            &db,
            &EventsArgs {
                after: Some("2025-01-15T09:10:00Z".into()),
                before: None,
            },
        )
        .unwrap();

        assert_eq!(count, 1);
        assert!(String::from_utf8(output).unwrap().contains(r#""id":"t1""#));
    }

    #[test]
    fn events_rejects_bad_timestamp() {
        let db = seeded();
        let err = run(
            &mut Vec::new(),
            &db,
            &EventsArgs {
                after: Some("not a time".into()),
                before: None,
            },
        )
        .unwrap_err();
        assert!(err.to_string().starts_with("Invalid datetime"));
    }
}
