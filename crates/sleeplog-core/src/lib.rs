//! Core domain logic for the sleep logger.
//!
//! This crate contains the fundamental types and logic for:
//! - Events: typed, timestamped records of physical sleep signals
//! - Bedtime dates: bucketing late-night timestamps onto the previous day
//! - Cleaning: filtering spuriously short sleep bouts from a raw night
//! - Statistics: deriving a sleep entry's fields from a cleaned night

pub mod bedtime;
pub mod clean;
pub mod entry;
pub mod event;
pub mod format;
pub mod stats;

pub use bedtime::{
    BedtimeError, DEFAULT_CUTOFF_HOUR, bedtime_date, bedtime_date_naive, bedtime_range,
};
pub use clean::clean_events;
pub use entry::Entry;
pub use event::{Event, EventId, EventKind, UnknownEventKind};
pub use format::format_duration;
pub use stats::{SleepStats, StatsError, compute_stats};
