use std::fs::File;
use std::io::{self, BufReader};

use anyhow::{Context, Result};
use clap::Parser;
use sr_core::SystemClock;
use tracing_subscriber::EnvFilter;

use sr_cli::commands::util::open_database;
use sr_cli::commands::{events, import, record, replay, status};
use sr_cli::{Cli, Commands, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        // No subcommand, show help
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    let mut db = open_database(&config)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match command {
        Commands::Start(args) => record::start(&mut out, &mut db, args)?,
        Commands::Tag(action) => record::tag(&mut out, &mut db, action)?,
        Commands::Note(args) => record::note(&mut out, &mut db, args)?,
        Commands::Adjust(args) => record::adjust(&mut out, &mut db, args)?,
        Commands::Replay(args) => {
            replay::run(&mut out, &db, SystemClock, args, config.round_policy()?)?;
        }
        Commands::Status => status::run(&mut out, &db, SystemClock)?,
        Commands::Events(args) => {
            events::run(&mut out, &db, args)?;
        }
        Commands::Import(args) => {
            let inserted = match &args.file {
                Some(path) => {
                    let file = File::open(path)
                        .with_context(|| format!("failed to open {}", path.display()))?;
                    import::run(BufReader::new(file), &mut db)?
                }
                None => import::run(io::stdin().lock(), &mut db)?,
            };
            let total = db.count_events()?;
            eprintln!("Imported {inserted} events ({total} logged)");
        }
    }

    Ok(())
}
