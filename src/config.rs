//! Configuration types, built from environment variables.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::notify::MailConfig;

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// libSQL database file.
    pub db_path: PathBuf,
    /// Port the REST server binds on 0.0.0.0.
    pub http_port: u16,
    /// How often the overdue scan runs.
    pub overdue_interval: Duration,
    /// Capacity of the deferred notification queue.
    pub notify_queue: usize,
    pub mail: MailConfig,
}

impl AppConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup (tests pass a map here).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup("TASKTRAIL_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/tasktrail.db"));

        let http_port = parse_var(&lookup, "TASKTRAIL_HTTP_PORT", 8000u16)?;

        let interval_secs = parse_var(&lookup, "TASKTRAIL_OVERDUE_INTERVAL_SECS", 60u64)?;
        if interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "TASKTRAIL_OVERDUE_INTERVAL_SECS".into(),
                message: "must be at least 1".into(),
            });
        }

        let notify_queue = parse_var(&lookup, "TASKTRAIL_NOTIFY_QUEUE", 256usize)?;
        if notify_queue == 0 {
            return Err(ConfigError::InvalidValue {
                key: "TASKTRAIL_NOTIFY_QUEUE".into(),
                message: "must be at least 1".into(),
            });
        }

        Ok(Self {
            db_path,
            http_port,
            overdue_interval: Duration::from_secs(interval_secs),
            notify_queue,
            mail: MailConfig::from_lookup(&lookup)?,
        })
    }
}

/// Parse `key` if set, otherwise fall back to `default`.
pub(crate) fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("'{raw}': {e}"),
            }),
        None => Ok(default),
    }
}

/// `1`, `true`, `yes` and `on` (any case) are true; anything else is false.
pub(crate) fn parse_flag<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).map_or(default, |raw| {
        matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
    })
}
