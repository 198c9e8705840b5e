//! Import command for appending JSONL events to the local `SQLite` store.

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use sr_core::Event;
use sr_db::Database;

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Read events from this file instead of stdin.
    #[arg(long)]
    pub file: Option<PathBuf>,
}

/// Appends every event read from `reader`, returning how many were new.
///
/// Events whose id is already logged are skipped. The whole batch is
/// rejected if any line fails to parse.
pub fn run<R: BufRead>(reader: R, db: &mut Database) -> Result<usize> {
    let events = parse_events(reader)?;
    let inserted = db
        .append_all(&events)
        .context("failed to append imported events")?;
    tracing::debug!(inserted, total = events.len(), "imported events");
    Ok(inserted)
}

fn parse_events<R: BufRead>(reader: R) -> Result<Vec<Event>> {
    let mut events = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", idx + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let event: Event = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid event on line {}", idx + 1))?;
        events.push(event);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INPUT: &str = r#"
{"id":"w1","timestamp":"2025-01-15T09:00:00Z","kind":{"type":"boundary_start","situation":"work"}}

{"id":"t1","timestamp":"2025-01-15T09:30:00Z","kind":{"type":"tag_add","tag":"x"}}
"#;

    #[test]
    fn import_appends_events() {
        let mut db = Database::open_in_memory().unwrap();

        let inserted = run(INPUT.as_bytes(), &mut db).unwrap();

        assert_eq!(inserted, 2);
        assert_eq!(db.count_events().unwrap(), 2);
    }

    #[test]
    fn import_reports_bad_line() {
        let mut db = Database::open_in_memory().unwrap();
        let input = format!(
            "{}\n{{\"id\":\"b1\",\"timestamp\":\"2025-01-15T10:00:00Z\",\"kind\":{{\"type\":\"lunch\"}}}}\n",
            INPUT.trim()
        );

        let err = run(input.as_bytes(), &mut db).unwrap_err();

        assert_eq!(err.to_string(), "invalid event on line 4");
        assert_eq!(db.count_events().unwrap(), 0);
    }

    #[test]
    fn import_skips_logged_events() {
        let mut db = Database::open_in_memory().unwrap();
        run(INPUT.as_bytes(), &mut db).unwrap();

        let inserted = run(INPUT.as_bytes(), &mut db).unwrap();

        assert_eq!(inserted, 0);
        assert_eq!(db.count_events().unwrap(), 2);
    }
}
