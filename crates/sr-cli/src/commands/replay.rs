//! Replay command for printing the situations over a window.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use sr_core::{Clock, EventStore, RoundPolicy, Situation, Sourcerer};

use crate::commands::util::{format_duration, parse_datetime, parse_duration};

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Window start (defaults to the first logged event).
    #[arg(long)]
    pub start: Option<String>,
    /// Window end, exclusive (defaults to now).
    #[arg(long)]
    pub end: Option<String>,
    /// Rounding granularity for boundaries (e.g., 15m); overrides the config.
    #[arg(long)]
    pub round: Option<String>,
    /// Output JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

pub fn run<W: Write, S: EventStore, C: Clock>(
    writer: &mut W,
    store: S,
    clock: C,
    args: &ReplayArgs,
    default_round: Option<RoundPolicy>,
) -> Result<()> {
    let start = args.start.as_deref().map(parse_datetime).transpose()?;
    let end = args.end.as_deref().map(parse_datetime).transpose()?;
    let round = match args.round.as_deref() {
        Some(round) => Some(RoundPolicy::new(parse_duration(round)?)?),
        None => default_round,
    };

    let sourcerer = Sourcerer::with_clock(store, clock);
    let situations = sourcerer
        .replay(start, end, round)
        .context("failed to replay situations")?;

    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&situations)?)?;
    } else {
        write_table(writer, &situations)?;
    }
    Ok(())
}

fn write_table<W: Write>(writer: &mut W, situations: &[Situation]) -> Result<()> {
    if situations.is_empty() {
        writeln!(writer, "No situations in window.")?;
        return Ok(());
    }
    for situation in situations {
        writeln!(writer, "{}", format_situation(situation))?;
    }
    Ok(())
}

/// Formats one situation as a table row.
pub fn format_situation(situation: &Situation) -> String {
    let mut line = format!(
        "{} - {}  {:<5}  {:>6}",
        situation.start().format("%Y-%m-%d %H:%M"),
        situation.end().format("%H:%M"),
        situation.kind().as_str(),
        format_duration(situation.duration()),
    );
    if !situation.tags().is_empty() {
        let tags: Vec<_> = situation.tags().iter().map(String::as_str).collect();
        line.push_str(&format!("  [{}]", tags.join(", ")));
    }
    if !situation.notes().is_empty() {
        line.push_str(&format!("  {}", situation.notes().join("; ")));
    }
    if situation.is_last() {
        line.push_str("  (open)");
    }
    line
}
