//! Settings file resolution

use std::path::PathBuf;

use anyhow::{Context, Result};
use monitor_lib::settings::{Settings, DEFAULT_SETTINGS_PATH, SETTINGS_PATH_ENV};

/// Settings file path: `MONITOR_SETTINGS` if set and non-empty, else `settings.json`
pub fn settings_path(env_value: Option<String>) -> PathBuf {
    env_value
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH))
}

/// Load and validate settings from the resolved path
pub fn load() -> Result<Settings> {
    let path = settings_path(std::env::var(SETTINGS_PATH_ENV).ok());
    Settings::load(&path).with_context(|| format!("loading settings from {}", path.display()))
}
