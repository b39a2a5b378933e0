//! # Daemon Configuration
//!
//! Every field has a default, so an empty JSON object (or no file at all) is a valid
//! configuration. Environment variables override the file:
//!
//! | Variable | Field |
//! |---|---|
//! | `RESOURCE_DAEMON_CONFIG` | path of a JSON file read first |
//! | `RESOURCE_DAEMON_DATA_DIR` | `data_dir` |
//! | `RESOURCE_DAEMON_REQUEST_BUFFER` | `request_buffer` |
//! | `RESOURCE_DAEMON_STREAM_CAPACITY` | `stream_capacity` |
//! | `RESOURCE_DAEMON_REQUEST_TIMEOUT_MS` | `request_timeout_ms` |
//! | `RESOURCE_DAEMON_LOG` | `log_filter` |

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_ENV: &str = "RESOURCE_DAEMON_CONFIG";
pub const DATA_DIR_ENV: &str = "RESOURCE_DAEMON_DATA_DIR";
pub const REQUEST_BUFFER_ENV: &str = "RESOURCE_DAEMON_REQUEST_BUFFER";
pub const STREAM_CAPACITY_ENV: &str = "RESOURCE_DAEMON_STREAM_CAPACITY";
pub const REQUEST_TIMEOUT_ENV: &str = "RESOURCE_DAEMON_REQUEST_TIMEOUT_MS";
pub const LOG_ENV: &str = "RESOURCE_DAEMON_LOG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    Read { path: PathBuf, message: String },
    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// Root of the file-backed store. Without it the daemon keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    /// Channel capacity of each controller server.
    pub request_buffer: usize,
    /// Pending updates per stream subscriber.
    pub stream_capacity: usize,
    pub request_timeout_ms: Option<u64>,
    pub log_filter: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            request_buffer: 32,
            stream_capacity: 100,
            request_timeout_ms: None,
            log_filter: "info".to_string(),
        }
    }
}

impl DaemonConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from `lookup`, which plays the role of the environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_ENV).filter(|p| !p.trim().is_empty()) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(dir) = lookup(DATA_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            config.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(raw) = lookup(REQUEST_BUFFER_ENV) {
            config.request_buffer = parse_number(REQUEST_BUFFER_ENV, &raw)?;
        }
        if let Some(raw) = lookup(STREAM_CAPACITY_ENV) {
            config.stream_capacity = parse_number(STREAM_CAPACITY_ENV, &raw)?;
        }
        if let Some(raw) = lookup(REQUEST_TIMEOUT_ENV) {
            config.request_timeout_ms = Some(parse_number(REQUEST_TIMEOUT_ENV, &raw)?);
        }
        if let Some(filter) = lookup(LOG_ENV).filter(|v| !v.trim().is_empty()) {
            config.log_filter = filter;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_buffer == 0 {
            return Err(invalid("request_buffer", "must be at least 1"));
        }
        if self.stream_capacity == 0 {
            return Err(invalid("stream_capacity", "must be at least 1"));
        }
        if self.request_timeout_ms == Some(0) {
            return Err(invalid("request_timeout_ms", "must be at least 1"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

fn parse_number<N>(key: &str, raw: &str) -> Result<N, ConfigError>
where
    N: std::str::FromStr,
    N::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: N::Err| invalid(key, format!("'{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = DaemonConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, DaemonConfig::default());
        assert_eq!(config.request_buffer, 32);
        assert_eq!(config.stream_capacity, 100);
        assert!(config.request_timeout().is_none());
    }

    #[test]
    fn test_env_overrides() {
        let config = DaemonConfig::from_lookup(lookup(&[
            (DATA_DIR_ENV, "/var/lib/daemon"),
            (REQUEST_BUFFER_ENV, " 8 "),
            (REQUEST_TIMEOUT_ENV, "1500"),
            (LOG_ENV, "debug"),
        ]))
        .unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/var/lib/daemon")));
        assert_eq!(config.request_buffer, 8);
        assert_eq!(config.request_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn test_invalid_values() {
        let err = DaemonConfig::from_lookup(lookup(&[(STREAM_CAPACITY_ENV, "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == STREAM_CAPACITY_ENV));

        let err = DaemonConfig::from_lookup(lookup(&[(REQUEST_BUFFER_ENV, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "request_buffer"));
    }
}
