//! Configuration system for the Ferry CLI.

use ferry_core::config::{EngineConfig, RcloneConfig, TransferConfig as EngineTransferConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Ferry configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// rclone configuration
    #[serde(default)]
    pub rclone: RcloneSection,
    /// Transfer configuration
    #[serde(default)]
    pub transfer: TransferConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// rclone configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RcloneSection {
    /// rclone executable
    #[serde(default = "default_rclone_path")]
    pub path: PathBuf,
    /// rclone config file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<PathBuf>,
    /// Extra flags added to every invocation
    #[serde(default)]
    pub extra_flags: String,
}

/// Transfer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// rclone `--stats` interval
    #[serde(default = "default_stats_interval")]
    pub stats_interval: String,
    /// Log files kept in the logs directory
    #[serde(default = "default_log_retention")]
    pub log_retention: usize,
    /// Directory for rclone log files
    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,
    /// Process poll interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Log read interval in milliseconds
    #[serde(default = "default_monitor_interval_ms")]
    pub monitor_interval_ms: u64,
    /// Empty log reads before giving up on progress
    #[serde(default = "default_monitor_idle_limit")]
    pub monitor_idle_limit: u32,
    /// Ask before copying
    #[serde(default = "default_true")]
    pub confirm_copy: bool,
    /// Ask before moving
    #[serde(default = "default_true")]
    pub confirm_move: bool,
    /// Ask before deleting
    #[serde(default = "default_true")]
    pub confirm_delete: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log file path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

// Default values

fn default_rclone_path() -> PathBuf {
    PathBuf::from("rclone")
}

fn default_rclone_config() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    Some(home.join(".config/rclone/rclone.conf"))
}

fn default_stats_interval() -> String {
    "1s".to_string()
}

fn default_log_retention() -> usize {
    5
}

fn default_logs_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ferry/logs")
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_monitor_interval_ms() -> u64 {
    500
}

fn default_monitor_idle_limit() -> u32 {
    20
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RcloneSection {
    fn default() -> Self {
        Self {
            path: default_rclone_path(),
            config: default_rclone_config(),
            extra_flags: String::new(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            stats_interval: default_stats_interval(),
            log_retention: default_log_retention(),
            logs_dir: default_logs_dir(),
            poll_interval_ms: default_poll_interval_ms(),
            monitor_interval_ms: default_monitor_interval_ms(),
            monitor_idle_limit: default_monitor_idle_limit(),
            confirm_copy: true,
            confirm_move: true,
            confirm_delete: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Check an environment flag value such as `RCLONE_DEBUG=1`
#[must_use]
pub fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes")
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, contents)?;
        Ok(())
    }

    /// Get default config path
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("ferry/config.toml")
    }

    /// Load config from default path, or create default if it doesn't exist
    ///
    /// # Errors
    ///
    /// Returns an error if reading or creating the config fails.
    pub fn load_or_default() -> anyhow::Result<Self> {
        let path = Self::default_path();

        if path.exists() {
            Self::load(&path)
        } else {
            let config = Self::default();
            config.save(&path)?;
            Ok(config)
        }
    }

    /// Apply `RCLONE_PATH` and `RCLONE_CONFIG` overrides from the environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(path) = var("RCLONE_PATH").filter(|v| !v.is_empty()) {
            self.rclone.path = PathBuf::from(path);
        }
        if let Some(config) = var("RCLONE_CONFIG").filter(|v| !v.is_empty()) {
            self.rclone.config = Some(PathBuf::from(config));
        }
    }

    /// Engine configuration derived from this file
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        let defaults = EngineTransferConfig::default();
        EngineConfig {
            rclone: RcloneConfig {
                program: self.rclone.path.clone(),
                config_path: self.rclone.config.clone(),
                extra_flags: self.rclone.extra_flags.clone(),
            },
            transfer: EngineTransferConfig {
                logs_dir: self.transfer.logs_dir.clone(),
                stats_interval: self.transfer.stats_interval.clone(),
                log_retention: self.transfer.log_retention,
                poll_interval: Duration::from_millis(self.transfer.poll_interval_ms),
                monitor_interval: Duration::from_millis(self.transfer.monitor_interval_ms),
                monitor_idle_limit: self.transfer.monitor_idle_limit,
                ..defaults
            },
        }
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid.
    pub fn validate(&self) -> anyhow::Result<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        let level = self.logging.level.to_lowercase();
        if !valid_log_levels.contains(&level.as_str()) {
            anyhow::bail!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            );
        }

        self.engine_config().validate()?;
        Ok(())
    }
}
