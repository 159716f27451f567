//! Connection descriptor for the notes store.
//!
//! Values are injected by the caller (or a test fixture); core code never
//! reads the process environment on its own.

use super::{DbError, DbResult};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const ENV_DB_PATH: &str = "NOTES_DB_PATH";
const ENV_BUSY_TIMEOUT_MS: &str = "NOTES_DB_BUSY_TIMEOUT_MS";

/// Where the store lives and how long to wait on a locked file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Database file. `None` opens a private in-memory store.
    pub path: Option<PathBuf>,
    /// SQLite busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl DbConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Builds a config from `NOTES_DB_PATH` / `NOTES_DB_BUSY_TIMEOUT_MS`.
    ///
    /// Unset variables fall back to defaults.
    ///
    /// # Errors
    /// - `DbError::InvalidConfig` when the timeout is not a non-negative integer.
    pub fn from_env() -> DbResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DbResult<Self> {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_DB_PATH) {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                config.path = Some(PathBuf::from(trimmed));
            }
        }

        if let Some(raw) = lookup(ENV_BUSY_TIMEOUT_MS) {
            config.busy_timeout_ms = raw.trim().parse().map_err(|_| {
                DbError::InvalidConfig(format!(
                    "{ENV_BUSY_TIMEOUT_MS} must be a non-negative integer, got `{raw}`"
                ))
            })?;
        }

        Ok(config)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::DbConfig;
    use crate::db::DbError;
    use std::path::PathBuf;

    #[test]
    fn lookup_without_values_yields_defaults() {
        let config = DbConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, DbConfig::in_memory());
        assert_eq!(config.busy_timeout_ms, 5_000);
    }

    #[test]
    fn lookup_reads_path_and_timeout() {
        let config = DbConfig::from_lookup(|key| match key {
            "NOTES_DB_PATH" => Some(" /tmp/notes.db ".to_string()),
            "NOTES_DB_BUSY_TIMEOUT_MS" => Some("250".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.path, Some(PathBuf::from("/tmp/notes.db")));
        assert_eq!(config.busy_timeout_ms, 250);
    }

    #[test]
    fn lookup_rejects_non_numeric_timeout() {
        let err = DbConfig::from_lookup(|key| {
            (key == "NOTES_DB_BUSY_TIMEOUT_MS").then(|| "soon".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, DbError::InvalidConfig(_)));
    }

    #[test]
    fn deserializes_partial_config_with_defaults() {
        let config: DbConfig = serde_json::from_str(r#"{"path":"notes.db"}"#).unwrap();
        assert_eq!(config.path, Some(PathBuf::from("notes.db")));
        assert_eq!(config.busy_timeout_ms, 5_000);
    }
}
