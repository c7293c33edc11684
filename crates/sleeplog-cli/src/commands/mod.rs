//! CLI subcommand implementations.

pub mod capture;
pub mod entries;
pub mod events;
pub mod status;
