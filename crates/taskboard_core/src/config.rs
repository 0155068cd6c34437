//! Runtime configuration for the board store.
//!
//! # Responsibility
//! - Describe where the snapshot database lives and how saves are paced.
//! - Read overrides from `TASKBOARD_*` environment variables.
//!
//! # Invariants
//! - `Default` is always usable: an in-memory database with no debounce.
//! - Malformed environment values are reported, never silently ignored.

use crate::logging::{default_log_level, normalize_level};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SNAPSHOT_KEY: &str = "taskboard-state";

const ENV_DB_PATH: &str = "TASKBOARD_DB_PATH";
const ENV_SNAPSHOT_KEY: &str = "TASKBOARD_SNAPSHOT_KEY";
const ENV_SAVE_DEBOUNCE_MS: &str = "TASKBOARD_SAVE_DEBOUNCE_MS";
const ENV_LOG_LEVEL: &str = "TASKBOARD_LOG_LEVEL";
const ENV_LOG_DIR: &str = "TASKBOARD_LOG_DIR";

/// Where the embedded database is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    File(PathBuf),
    /// Private database that disappears with the gateway.
    Memory,
}

/// Store and gateway settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub db_location: DbLocation,
    /// Fixed key of the single snapshot record.
    pub snapshot_key: String,
    /// Quiet period before a scheduled save is written. Zero writes at once.
    pub save_debounce: Duration,
    pub log_level: String,
    /// `None` leaves logging uninitialized.
    pub log_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_location: DbLocation::Memory,
            snapshot_key: DEFAULT_SNAPSHOT_KEY.to_string(),
            save_debounce: Duration::ZERO,
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Invalid { key: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid { key, value } => write!(f, "invalid value `{value}` for {key}"),
        }
    }
}

impl Error for ConfigError {}

impl StoreConfig {
    /// Builds a configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let read = |key: &str| lookup(key).map(|value| value.trim().to_string());

        if let Some(path) = read(ENV_DB_PATH) {
            config.db_location = match path.as_str() {
                "" => {
                    return Err(ConfigError::Invalid {
                        key: ENV_DB_PATH,
                        value: String::new(),
                    })
                }
                ":memory:" => DbLocation::Memory,
                _ => DbLocation::File(PathBuf::from(path)),
            };
        }

        if let Some(key) = read(ENV_SNAPSHOT_KEY) {
            if key.is_empty() {
                return Err(ConfigError::Invalid {
                    key: ENV_SNAPSHOT_KEY,
                    value: key,
                });
            }
            config.snapshot_key = key;
        }

        if let Some(raw) = read(ENV_SAVE_DEBOUNCE_MS) {
            let millis = raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
                key: ENV_SAVE_DEBOUNCE_MS,
                value: raw.clone(),
            })?;
            config.save_debounce = Duration::from_millis(millis);
        }

        if let Some(level) = read(ENV_LOG_LEVEL) {
            let normalized = normalize_level(&level).map_err(|_| ConfigError::Invalid {
                key: ENV_LOG_LEVEL,
                value: level.clone(),
            })?;
            config.log_level = normalized.to_string();
        }

        if let Some(dir) = read(ENV_LOG_DIR).filter(|dir| !dir.is_empty()) {
            config.log_dir = Some(PathBuf::from(dir));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, DbLocation, StoreConfig, DEFAULT_SNAPSHOT_KEY};
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = StoreConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.snapshot_key, DEFAULT_SNAPSHOT_KEY);
        assert_eq!(config.db_location, DbLocation::Memory);
    }

    #[test]
    fn environment_overrides_are_applied() {
        let config = StoreConfig::from_lookup(lookup(&[
            ("TASKBOARD_DB_PATH", "/tmp/boards/state.sqlite3"),
            ("TASKBOARD_SAVE_DEBOUNCE_MS", " 250 "),
            ("TASKBOARD_LOG_LEVEL", "WARNING"),
            ("TASKBOARD_LOG_DIR", "/tmp/boards/logs"),
        ]))
        .unwrap();

        assert_eq!(
            config.db_location,
            DbLocation::File(PathBuf::from("/tmp/boards/state.sqlite3"))
        );
        assert_eq!(config.save_debounce, Duration::from_millis(250));
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/boards/logs")));
    }

    #[test]
    fn malformed_debounce_is_rejected() {
        let err = StoreConfig::from_lookup(lookup(&[("TASKBOARD_SAVE_DEBOUNCE_MS", "soon")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "TASKBOARD_SAVE_DEBOUNCE_MS",
                value: "soon".to_string()
            }
        );
    }

    #[test]
    fn unknown_log_level_is_rejected_without_log_dir() {
        let err = StoreConfig::from_lookup(lookup(&[("TASKBOARD_LOG_LEVEL", "chatty")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "TASKBOARD_LOG_LEVEL",
                value: "chatty".to_string()
            }
        );
    }
}
