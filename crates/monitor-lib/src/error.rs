//! Error types for the monitoring core
//!
//! Each collaborator boundary gets its own error enum so callers can decide
//! what is fatal: a `SourceError` ends one sampler, a `MessagingError` is
//! logged and retried on the next poll, a `ConfigError` ends the process.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading OS counter sources
#[derive(Error, Debug)]
pub enum SourceError {
    /// The counter file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The counter source was readable but not in the expected shape
    #[error("malformed {origin}: {reason}")]
    Malformed { origin: String, reason: String },

    /// A required key was absent or zero
    #[error("{field} not found in {origin}")]
    MissingField { origin: String, field: &'static str },
}

/// Errors raised by the messaging collaborator
#[derive(Error, Debug)]
pub enum MessagingError {
    /// Transport-level failure (connect, timeout, TLS)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered but reported a failure
    #[error("API error ({code}): {description}")]
    Api { code: u16, description: String },

    /// The base URL or method path could not be built
    #[error("invalid API URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Errors raised while loading settings
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The settings source could not be read or deserialized
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    /// A setting was present but out of range
    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_error_display_names_path() {
        let err = SourceError::MissingField {
            origin: "/proc/meminfo".to_string(),
            field: "MemTotal",
        };
        assert_eq!(err.to_string(), "MemTotal not found in /proc/meminfo");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Invalid {
            key: "bot_token",
            reason: "must not be empty".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid setting `bot_token`: must not be empty"
        );
    }
}
