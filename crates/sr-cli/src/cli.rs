//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::events::EventsArgs;
use crate::commands::import::ImportArgs;
use crate::commands::record::{AdjustArgs, NoteArgs, StartArgs, TagAction};
use crate::commands::replay::ReplayArgs;

/// Work/break situation tracker.
///
/// Records an append-only log of work and break boundaries, tags and notes, and
/// replays it into the situations that held over any time window.
#[derive(Debug, Parser)]
#[command(name = "sr", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start a work or break situation.
    Start(StartArgs),

    /// Add or remove a tag on the current situation.
    #[command(subcommand)]
    Tag(TagAction),

    /// Attach a note to the current situation.
    Note(NoteArgs),

    /// Move the current situation's start earlier.
    Adjust(AdjustArgs),

    /// Replay the situations over a time window.
    Replay(ReplayArgs),

    /// Show the current situation.
    Status,

    /// Dump logged events as JSONL.
    Events(EventsArgs),

    /// Append JSONL events from stdin.
    Import(ImportArgs),
}
