//! Service settings
//!
//! Settings are read once at startup from a JSON file, with `MONITOR__*`
//! environment variables layered on top, and never change afterwards.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::messaging::DEFAULT_API_URL;
use crate::models::ResourceKind;

/// Default location of the settings file
pub const DEFAULT_SETTINGS_PATH: &str = "settings.json";

/// Environment variable overriding the settings file location
pub const SETTINGS_PATH_ENV: &str = "MONITOR_SETTINGS";

/// Full settings as stored in the settings file
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Bot API token
    pub bot_token: String,

    /// The only chat allowed to issue commands, and the alert destination
    pub chat_id: i64,

    /// Application version shown at startup
    #[serde(rename = "version")]
    pub app_version: String,

    /// Name of this host
    pub node_name: String,

    /// Pause between CPU samples in milliseconds
    #[serde(rename = "cpu_check_duration")]
    pub cpu_interval_ms: u64,

    /// Pause between memory samples in milliseconds
    #[serde(rename = "memory_check_duration")]
    pub memory_interval_ms: u64,

    /// CPU alert threshold in percent, 0 or less disables CPU alerts
    pub cpu_limit: i64,

    /// Memory alert threshold in percent, 0 or less disables memory alerts
    pub memory_limit: i64,

    /// Whether monitoring is enabled when the service starts
    #[serde(rename = "default_monitoring_status")]
    pub monitoring_enabled: bool,

    /// Minimum gap between two alerts for the same resource (0 = every check)
    #[serde(default)]
    pub alert_cooldown_ms: u64,

    /// Bot API base URL
    #[serde(default = "default_api_url")]
    pub telegram_api_url: String,

    /// Long-poll timeout passed to the bot API
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,

    /// Root of the proc filesystem
    #[serde(default = "default_proc_root")]
    pub proc_root: PathBuf,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_proc_root() -> PathBuf {
    PathBuf::from("/proc")
}

impl Settings {
    /// Load settings from a JSON file plus `MONITOR__*` environment overrides
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Json))
            .add_source(
                config::Environment::with_prefix("MONITOR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the core cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot_token.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "bot_token",
                reason: "must not be empty".to_string(),
            });
        }
        if self.cpu_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "cpu_check_duration",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.memory_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "memory_check_duration",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Threshold view consumed by the monitoring core
    pub fn thresholds(&self) -> ThresholdConfig {
        ThresholdConfig {
            cpu_limit_percent: self.cpu_limit,
            memory_limit_percent: self.memory_limit,
            cpu_interval: Duration::from_millis(self.cpu_interval_ms),
            memory_interval: Duration::from_millis(self.memory_interval_ms),
        }
    }

    pub fn alert_cooldown(&self) -> Duration {
        Duration::from_millis(self.alert_cooldown_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}

/// Immutable thresholds and sampling intervals
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdConfig {
    pub cpu_limit_percent: i64,
    pub memory_limit_percent: i64,
    pub cpu_interval: Duration,
    pub memory_interval: Duration,
}

impl ThresholdConfig {
    /// Alert limit for a resource, `None` when alerting is disabled for it
    pub fn limit_for(&self, kind: ResourceKind) -> Option<i64> {
        let limit = match kind {
            ResourceKind::Cpu => self.cpu_limit_percent,
            ResourceKind::Memory => self.memory_limit_percent,
        };
        (limit > 0).then_some(limit)
    }

    pub fn interval_for(&self, kind: ResourceKind) -> Duration {
        match kind {
            ResourceKind::Cpu => self.cpu_interval,
            ResourceKind::Memory => self.memory_interval,
        }
    }
}
