//! Commands that append events to the situation log.

use std::io::Write;

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};
use uuid::Uuid;

use sr_core::{Event, EventId, EventKind, SituationKind};
use sr_db::{Database, format_timestamp};

use crate::commands::util::{now, parse_datetime};

#[derive(Debug, Args)]
pub struct StartArgs {
    /// Situation to start: "work" or "break".
    pub kind: SituationKind,
    /// When the situation started (defaults to now).
    #[arg(long)]
    pub at: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum TagAction {
    /// Add a tag to the current situation.
    Add {
        /// Tag name.
        name: String,
        /// When the tag was added (defaults to now).
        #[arg(long)]
        at: Option<String>,
    },
    /// Remove a tag from the current situation.
    Remove {
        /// Tag name.
        name: String,
        /// When the tag was removed (defaults to now).
        #[arg(long)]
        at: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct NoteArgs {
    /// Note text.
    pub text: String,
    /// When the note was taken (defaults to now).
    #[arg(long)]
    pub at: Option<String>,
}

#[derive(Debug, Args)]
pub struct AdjustArgs {
    /// New, earlier start for the current situation.
    pub start: String,
    /// When the adjustment was made (defaults to now).
    #[arg(long)]
    pub at: Option<String>,
}

pub fn start<W: Write>(writer: &mut W, db: &mut Database, args: &StartArgs) -> Result<()> {
    let kind = EventKind::BoundaryStart {
        situation: args.kind,
    };
    let event = record(db, kind, args.at.as_deref())?;
    writeln!(
        writer,
        "Started {} at {}",
        args.kind,
        format_timestamp(event.timestamp)
    )?;
    Ok(())
}

pub fn tag<W: Write>(writer: &mut W, db: &mut Database, action: &TagAction) -> Result<()> {
    let (kind, at, verb) = match action {
        TagAction::Add { name, at } => (
            EventKind::TagAdd {
                tag: normalize_tag(name)?,
            },
            at,
            "Tagged",
        ),
        TagAction::Remove { name, at } => (
            EventKind::TagRemove {
                tag: normalize_tag(name)?,
            },
            at,
            "Untagged",
        ),
    };
    let event = record(db, kind, at.as_deref())?;
    if let EventKind::TagAdd { tag } | EventKind::TagRemove { tag } = &event.kind {
        writeln!(writer, "{verb} current situation with {tag}")?;
    }
    Ok(())
}

pub fn note<W: Write>(writer: &mut W, db: &mut Database, args: &NoteArgs) -> Result<()> {
    let text = args.text.trim();
    if text.is_empty() {
        bail!("note cannot be empty");
    }
    let kind = EventKind::Note {
        text: text.to_string(),
    };
    record(db, kind, args.at.as_deref())?;
    writeln!(writer, "Noted: {text}")?;
    Ok(())
}

pub fn adjust<W: Write>(writer: &mut W, db: &mut Database, args: &AdjustArgs) -> Result<()> {
    let start = parse_datetime(&args.start)?;
    let kind = EventKind::TimeAdjust { start };
    let event = record(db, kind, args.at.as_deref())?;
    if start > event.timestamp {
        tracing::warn!(%start, at = %event.timestamp, "adjusted start lies after the adjustment itself");
    }
    writeln!(
        writer,
        "Moved current start to {}",
        format_timestamp(start)
    )?;
    Ok(())
}

fn normalize_tag(name: &str) -> Result<String> {
    let tag = name.trim();
    if tag.is_empty() {
        bail!("tag cannot be empty");
    }
    Ok(tag.to_string())
}

/// Appends an event with a fresh link at `at` (or now).
fn record(db: &mut Database, kind: EventKind, at: Option<&str>) -> Result<Event> {
    let timestamp = at.map_or_else(|| Ok(now()), parse_datetime)?;
    let id = EventId::new(Uuid::new_v4().to_string()).context("generated an empty event link")?;
    let event = Event::new(id, timestamp, kind);
    db.append(&event)
        .with_context(|| format!("failed to record {} event", event.event_type()))?;
    tracing::debug!(event = %event.id, kind = %event.event_type(), "recorded event");
    Ok(event)
}
