//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::TimeDelta;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Quiet period after a button press before the sleeper is presumed
    /// asleep.
    pub cooldown_minutes: u64,
    /// LED flash pulse width.
    pub flash_ms: u64,
    /// Interval of the heartbeat blink while presumed asleep.
    pub blink_interval_ms: u64,
    /// Sleep segments shorter than this are treated as noise when cleaning
    /// a night's events.
    pub min_sleep_minutes: i64,
    /// Hour of day (0-23) separating one bedtime date from the next.
    pub cutoff_hour: u32,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("cooldown_minutes", &self.cooldown_minutes)
            .field("cutoff_hour", &self.cutoff_hour)
            .finish_non_exhaustive()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("sleeplog.db"),
            cooldown_minutes: 15,
            flash_ms: 100,
            blink_interval_ms: 2000,
            min_sleep_minutes: 15,
            cutoff_hour: 12,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (SLEEPLOG_*)
        figment = figment.merge(Env::prefixed("SLEEPLOG_"));

        figment.extract()
    }

    /// The cooldown period as a timer duration.
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_minutes * 60)
    }

    /// The flash pulse width as a timer duration.
    #[must_use]
    pub const fn flash_pulse(&self) -> Duration {
        Duration::from_millis(self.flash_ms)
    }

    /// The heartbeat blink interval as a timer duration.
    #[must_use]
    pub const fn blink_interval(&self) -> Duration {
        Duration::from_millis(self.blink_interval_ms)
    }

    /// The minimum sleep duration used by the event cleaner.
    #[must_use]
    pub fn min_sleep(&self) -> TimeDelta {
        TimeDelta::minutes(self.min_sleep_minutes)
    }
}

/// Returns the platform-specific config directory for sleeplog.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("sleeplog"))
}

/// Returns the platform-specific data directory for sleeplog.
///
/// On Linux: `~/.local/share/sleeplog`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("sleeplog"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_data_dir_for_db() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("sleeplog.db"));
    }

    #[test]
    fn defaults_match_the_device_timings() {
        let config = Config::default();
        assert_eq!(config.cooldown(), Duration::from_secs(15 * 60));
        assert_eq!(config.flash_pulse(), Duration::from_millis(100));
        assert_eq!(config.blink_interval(), Duration::from_millis(2000));
        assert_eq!(config.min_sleep(), TimeDelta::minutes(15));
        assert_eq!(config.cutoff_hour, 12);
    }

    #[test]
    fn config_file_overrides_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "cooldown_minutes = 30\ncutoff_hour = 10\n").unwrap();

        let config = Config::load_from(Some(&path)).unwrap();
        assert_eq!(config.cooldown_minutes, 30);
        assert_eq!(config.cutoff_hour, 10);
        // Untouched keys keep their defaults.
        assert_eq!(config.flash_ms, 100);
    }
}
