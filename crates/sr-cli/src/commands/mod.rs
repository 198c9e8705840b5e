//! CLI subcommand implementations.

pub mod events;
pub mod import;
pub mod record;
pub mod replay;
pub mod status;
pub mod util;
