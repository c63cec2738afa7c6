//! Engine configuration

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Engine configuration
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// External tool configuration
    pub rclone: RcloneConfig,

    /// Transfer execution tuning
    pub transfer: TransferConfig,
}

impl EngineConfig {
    /// Check that every interval and capacity is usable
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.rclone.program.as_os_str().is_empty() {
            return Err(Error::invalid_config("rclone program path is empty"));
        }
        if !is_valid_stats_interval(&self.transfer.stats_interval) {
            let message = format!(
                "stats interval '{}' must be a number followed by ms, s, m or h",
                self.transfer.stats_interval
            );
            return Err(Error::InvalidConfig(message.into()));
        }
        if self.transfer.poll_interval.is_zero() {
            return Err(Error::invalid_config("poll interval is zero"));
        }
        if self.transfer.monitor_interval.is_zero() {
            return Err(Error::invalid_config("monitor interval is zero"));
        }
        if self.transfer.monitor_idle_limit == 0 {
            return Err(Error::invalid_config("monitor idle limit is zero"));
        }
        if self.transfer.monitor_stop_timeout.is_zero() {
            return Err(Error::invalid_config("monitor stop timeout is zero"));
        }
        if self.transfer.channel_capacity == 0 {
            return Err(Error::invalid_config("progress channel capacity is zero"));
        }
        Ok(())
    }
}

/// External tool configuration
#[derive(Debug, Clone)]
pub struct RcloneConfig {
    /// Program to run
    pub program: PathBuf,

    /// Value for `--config`, omitted when `None`
    pub config_path: Option<PathBuf>,

    /// Extra flags, split on whitespace and added to every invocation
    pub extra_flags: String,
}

impl Default for RcloneConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("rclone"),
            config_path: None,
            extra_flags: String::new(),
        }
    }
}

impl RcloneConfig {
    /// Extra flags as separate arguments
    #[must_use]
    pub fn extra_args(&self) -> Vec<String> {
        self.extra_flags
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

/// Transfer execution tuning
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Directory receiving per-invocation log files
    pub logs_dir: PathBuf,

    /// Value for `--stats`, e.g. `1s`
    pub stats_interval: String,

    /// Number of log files kept by retention
    pub log_retention: usize,

    /// How often the coordinator checks for exit and cancellation
    pub poll_interval: Duration,

    /// Sleep between monitor cycles
    pub monitor_interval: Duration,

    /// Empty cycles before the monitor gives up on a log that never appears
    pub monitor_idle_limit: u32,

    /// How long to wait for a stopped monitor before abandoning it
    pub monitor_stop_timeout: Duration,

    /// Bound of the progress snapshot channel
    pub channel_capacity: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            logs_dir: PathBuf::from("logs"),
            stats_interval: "1s".to_string(),
            log_retention: 5,
            poll_interval: Duration::from_millis(100),
            monitor_interval: Duration::from_millis(500),
            monitor_idle_limit: 20, // ~10 s at the default interval
            monitor_stop_timeout: Duration::from_secs(2),
            channel_capacity: 64,
        }
    }
}

/// Check a duration string of the form `<number><unit>`
fn is_valid_stats_interval(interval: &str) -> bool {
    let Some(split) = interval.find(|c: char| !c.is_ascii_digit() && c != '.') else {
        return false;
    };
    let (number, unit) = interval.split_at(split);
    matches!(unit, "ms" | "s" | "m" | "h") && number.parse::<f64>().is_ok_and(|n| n > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.transfer.log_retention, 5);
        assert_eq!(config.transfer.poll_interval, Duration::from_millis(100));
        assert_eq!(config.transfer.monitor_idle_limit, 20);
    }

    #[test]
    fn test_stats_interval_format() {
        assert!(is_valid_stats_interval("1s"));
        assert!(is_valid_stats_interval("500ms"));
        assert!(is_valid_stats_interval("0.5s"));
        assert!(is_valid_stats_interval("2m"));
        assert!(is_valid_stats_interval("1h"));
        assert!(!is_valid_stats_interval("1"));
        assert!(!is_valid_stats_interval("s"));
        assert!(!is_valid_stats_interval("0s"));
        assert!(!is_valid_stats_interval("1d"));
        assert!(!is_valid_stats_interval(""));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = EngineConfig::default();
        config.transfer.poll_interval = Duration::ZERO;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let mut config = EngineConfig::default();
        config.transfer.channel_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.transfer.monitor_idle_limit = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.transfer.stats_interval = "fast".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_extra_args_split() {
        let config = RcloneConfig {
            extra_flags: "  --transfers 4\t--fast-list ".to_string(),
            ..Default::default()
        };
        assert_eq!(config.extra_args(), ["--transfers", "4", "--fast-list"]);
        assert!(RcloneConfig::default().extra_args().is_empty());
    }
}
