//! Command-line argument definitions.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// Sleep event logger.
///
/// Captures bedtime events from a hardware button and lid sensor, then
/// aggregates each night's events into a sleep entry with derived
/// statistics.
#[derive(Debug, Parser)]
#[command(name = "sleeplog", version, about, long_about = None)]
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
    /// Run the capture state machine, reading hardware signals from stdin.
    ///
    /// One signal per line: button-released, lid-raised, lid-closed, or
    /// error:<payload>. The loop runs until stdin closes.
    Capture,

    /// List events as JSONL.
    Events {
        /// Only events not yet consumed by an entry.
        #[arg(long)]
        unconsumed: bool,

        /// Lower bound, inclusive (ISO 8601, e.g. 2024-03-01T22:00:00Z).
        #[arg(long, conflicts_with = "unconsumed")]
        after: Option<String>,

        /// Upper bound, inclusive (ISO 8601).
        #[arg(long, conflicts_with = "unconsumed")]
        before: Option<String>,
    },

    /// Manage aggregated sleep entries.
    Entries {
        #[command(subcommand)]
        action: EntriesAction,
    },

    /// Show store counts and unconsumed events grouped by night.
    Status,
}

/// Entry lifecycle operations.
#[derive(Debug, Subcommand)]
pub enum EntriesAction {
    /// List all entries, one summary line per night.
    List,

    /// Show one entry in full, with its consumed events.
    Show {
        /// Entry identifier (bedtime date, YYYY-MM-DD).
        id: String,
    },

    /// Aggregate the raw events of one night into an entry.
    ///
    /// Resolves the night's time window from the bedtime date and consumes
    /// every event inside it. Recomputing an existing night overwrites its
    /// derived fields but keeps its notes.
    Create {
        /// Bedtime date of the night to aggregate (YYYY-MM-DD).
        #[arg(long)]
        date: NaiveDate,
    },

    /// Delete an entry, releasing its events for re-aggregation.
    Delete {
        /// Entry identifier (bedtime date, YYYY-MM-DD).
        id: String,
    },

    /// Set or clear an entry's free-text notes.
    Note {
        /// Entry identifier (bedtime date, YYYY-MM-DD).
        id: String,

        /// The notes text.
        #[arg(required_unless_present = "clear")]
        text: Option<String>,

        /// Clear the notes instead of setting them.
        #[arg(long, conflicts_with = "text")]
        clear: bool,
    },
}
