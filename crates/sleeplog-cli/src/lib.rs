//! Sleep logger CLI library.
//!
//! This crate provides the CLI interface for the sleep logger.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, EntriesAction};
pub use config::Config;
