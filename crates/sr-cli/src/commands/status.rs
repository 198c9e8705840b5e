//! Status command for showing the current situation.

use std::io::Write;

use anyhow::{Context, Result};
use sr_core::{Clock, EventStore, Sourcerer};
use sr_db::format_timestamp;

use crate::commands::util::format_duration;

/// Prints the situation open at the clock's current time.
///
/// Replay starts at the boundary before the most recent one, so an adjusted
/// start that reaches into the previous situation still shows.
pub fn run<W: Write, S: EventStore, C: Clock>(writer: &mut W, store: S, clock: C) -> Result<()> {
    let now = clock.now();

    let mut since = None;
    let mut boundaries = 0;
    for event in store.iter_before(now) {
        let event = event.context("failed to scan the event log")?;
        since = Some(event.timestamp);
        if event.boundary().is_some() {
            boundaries += 1;
            if boundaries == 2 {
                break;
            }
        }
    }
    let Some(since) = since else {
        writeln!(writer, "No events logged.")?;
        return Ok(());
    };

    let sourcerer = Sourcerer::with_clock(store, clock);
    let situations = sourcerer
        .replay(Some(since), Some(now), None)
        .context("failed to replay the current situation")?;
    let Some(current) = situations.last() else {
        writeln!(writer, "No events logged.")?;
        return Ok(());
    };

    writeln!(
        writer,
        "{} since {} ({})",
        current.kind(),
        format_timestamp(current.start()),
        format_duration(current.duration()),
    )?;
    if !current.tags().is_empty() {
        let tags: Vec<_> = current.tags().iter().map(String::as_str).collect();
        writeln!(writer, "Tags: {}", tags.join(", "))?;
    }
    for note in current.notes() {
        writeln!(writer, "Note: {note}")?;
    }
    Ok(())
}
