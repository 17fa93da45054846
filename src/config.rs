//! Configuration management
//!
//! Handles loading and parsing of the JSON configuration file with `.env`
//! and environment variable overrides for paths and bot credentials.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::common::CircuitBreakerConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read config file {}", path.as_ref().display())
        })?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        Ok(config)
    }

    /// Load the file if given (defaults otherwise), then apply `.env` and
    /// environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                debug!("No config file given, using defaults");
                Config::default()
            }
        };

        dotenv::dotenv().ok();
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override fields from `lookup` (usually the process environment)
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(db_path) = non_empty("LOTTERY_DB_PATH") {
            self.storage.db_path = PathBuf::from(db_path);
        }
        if let Some(token) = non_empty("TELEGRAM_BOT_TOKEN") {
            self.notifications.bot_token = Some(token);
        }
        if let Some(url) = non_empty("LOTTERY_WEBHOOK_URL") {
            self.notifications.webhook_url = Some(url);
        }
        if let Some(secret) = non_empty("LOTTERY_WEBHOOK_SECRET") {
            self.notifications.webhook_secret = Some(secret);
        }
        if let Some(owner) = non_empty("LOTTERY_OWNER_RECIPIENT") {
            self.notifications.owner_recipient = owner;
        }
    }
}

/// SQLite storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: PathBuf,
    /// How long a writer waits for another process' transaction
    pub busy_timeout_ms: u64,
    /// Where `export` writes the JSON snapshot unless given a path
    pub json_backup_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            db_path: PathBuf::from("data/lottery.db"),
            busy_timeout_ms: 5_000,
            json_backup_path: PathBuf::from("data/lottery_backup.json"),
        }
    }
}

impl StorageConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Notification delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<String>,
    /// Recipient of the per-draw operator summary
    pub owner_recipient: String,
    pub timeout_secs: u64,
    pub failure_threshold: u32,
    pub cooldown_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        NotificationConfig {
            enabled: true,
            webhook_url: None,
            bot_token: None,
            webhook_secret: None,
            owner_recipient: "owner".to_string(),
            timeout_secs: 10,
            failure_threshold: 3,
            cooldown_secs: 60,
        }
    }
}

impl NotificationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn breaker(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::default()
            .with_failure_threshold(self.failure_threshold)
            .with_cooldown(Duration::from_secs(self.cooldown_secs))
    }
}

/// Draw scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Seconds between due-date checks
    pub interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig {
            interval_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            dir: PathBuf::from("logs"),
        }
    }
}
