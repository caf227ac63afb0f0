use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::{
    ErrorKind, DEFAULT_CONFIRMATION_MS, DEFAULT_DEBOUNCE_MS, DEFAULT_ERROR_NOTICE_MS,
    DEFAULT_GRACE_WINDOW_MS, DEFAULT_MAX_QUERY_LEN,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::Config
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How long an optimistic removal stays undoable before it is committed.
    pub grace_window_ms: u64,
    pub confirmation_ms: u64,
    pub error_notice_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            grace_window_ms: DEFAULT_GRACE_WINDOW_MS,
            confirmation_ms: DEFAULT_CONFIRMATION_MS,
            error_notice_ms: DEFAULT_ERROR_NOTICE_MS,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grace_window_ms == 0 {
            return Err(ConfigError::Invalid("grace_window_ms must be > 0".into()));
        }
        if self.confirmation_ms == 0 {
            return Err(ConfigError::Invalid("confirmation_ms must be > 0".into()));
        }
        if self.error_notice_ms == 0 {
            return Err(ConfigError::Invalid("error_notice_ms must be > 0".into()));
        }
        Ok(())
    }

    #[must_use]
    pub const fn grace_window(&self) -> Duration {
        Duration::from_millis(self.grace_window_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Quiet period after the last keystroke before a draft is promoted.
    /// The editing guard is released on the same schedule.
    pub debounce_ms: u64,
    pub max_query_len: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            max_query_len: DEFAULT_MAX_QUERY_LEN,
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.debounce_ms == 0 {
            return Err(ConfigError::Invalid("debounce_ms must be > 0".into()));
        }
        if self.max_query_len == 0 {
            return Err(ConfigError::Invalid("max_query_len must be > 0".into()));
        }
        Ok(())
    }

    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub scheduler: SchedulerConfig,
    pub filters: FilterConfig,
}

impl CoreConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scheduler.validate()?;
        self.filters.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_default_config_is_valid() {
        assert!(CoreConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = CoreConfig::from_json_str(r#"{ "filters": { "debounce_ms": 300 } }"#).unwrap();
        assert_eq!(config.filters.debounce_ms, 300);
        assert_eq!(config.filters.max_query_len, DEFAULT_MAX_QUERY_LEN);
        assert_eq!(config.scheduler, SchedulerConfig::default());
    }

    #[test]
    fn test_zero_grace_window_rejected() {
        let result = CoreConfig::from_json_str(r#"{ "scheduler": { "grace_window_ms": 0 } }"#);
        assert_matches!(result, Err(ConfigError::Invalid(_)));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert_matches!(CoreConfig::from_json_str("{"), Err(ConfigError::Parse(_)));
    }

    #[test]
    fn test_durations() {
        let config = CoreConfig::default();
        assert_eq!(config.scheduler.grace_window(), Duration::from_millis(5_000));
        assert_eq!(config.filters.debounce(), Duration::from_millis(500));
    }
}
