use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sleeplog_cli::commands::{capture, entries, events, status};
use sleeplog_cli::{Cli, Commands, Config, EntriesAction};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(sleeplog_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = sleeplog_db::Database::open(&config.database_path)
        .context("failed to open database")?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    match &cli.command {
        Some(Commands::Capture) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            capture::run(db, &config)?;
        }
        Some(Commands::Events {
            unconsumed,
            after,
            before,
        }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            let mut stdout = std::io::stdout().lock();
            events::run(
                &mut stdout,
                &db,
                *unconsumed,
                after.as_deref(),
                before.as_deref(),
            )?;
        }
        Some(Commands::Entries { action }) => {
            let (mut db, config) = open_database(cli.config.as_deref())?;
            let mut stdout = std::io::stdout().lock();
            match action {
                EntriesAction::List => entries::list(&mut stdout, &db)?,
                EntriesAction::Show { id } => entries::show(&mut stdout, &db, id)?,
                EntriesAction::Create { date } => {
                    entries::create(&mut stdout, &mut db, *date, &config)?;
                }
                EntriesAction::Delete { id } => entries::delete(&mut stdout, &mut db, id)?,
                EntriesAction::Note { id, text, clear } => {
                    let notes = if *clear { None } else { text.as_deref() };
                    entries::note(&mut db, id, notes)?;
                }
            }
        }
        Some(Commands::Status) => {
            let (mut db, config) = open_database(cli.config.as_deref())?;
            let mut stdout = std::io::stdout().lock();
            status::run(&mut stdout, &mut db, &config)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
