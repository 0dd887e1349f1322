//! Collector configuration.
//!
//! All values are plain durations. Defaults match a typical one-second
//! scrape: queries time out after 2 seconds, `max_connections` is re-read every
//! 30 minutes and the database list every minute.

use std::time::Duration;

use thiserror::Error;

/// Default per-query timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Default interval between `max_connections` re-checks.
pub const DEFAULT_RECHECK_SETTINGS_EVERY: Duration = Duration::from_secs(30 * 60);

/// Default interval between database list refreshes.
pub const DEFAULT_RELIST_DATABASES_EVERY: Duration = Duration::from_secs(60);

/// Error type for invalid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{field} must be positive")]
    NonPositive { field: &'static str },
    #[error("PGUSER or USER not set")]
    MissingUser,
}

/// Timing configuration consumed read-only by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorConfig {
    /// Deadline applied to connection checks and to every query.
    pub timeout: Duration,
    /// Refresh window for the `max_connections` setting.
    pub recheck_settings_every: Duration,
    /// Refresh window for the database inventory.
    pub relist_databases_every: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            recheck_settings_every: DEFAULT_RECHECK_SETTINGS_EVERY,
            relist_databases_every: DEFAULT_RELIST_DATABASES_EVERY,
        }
    }
}

impl CollectorConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_recheck_settings_every(mut self, interval: Duration) -> Self {
        self.recheck_settings_every = interval;
        self
    }

    pub fn with_relist_databases_every(mut self, interval: Duration) -> Self {
        self.relist_databases_every = interval;
        self
    }

    /// Checks that every duration is non-zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("timeout", self.timeout),
            ("recheck_settings_every", self.recheck_settings_every),
            ("relist_databases_every", self.relist_databases_every),
        ];
        for (field, value) in fields {
            if value.is_zero() {
                return Err(ConfigError::NonPositive { field });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(CollectorConfig::default().validate(), Ok(()));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = CollectorConfig::default().with_timeout(Duration::ZERO);
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonPositive { field: "timeout" })
        );
    }

    #[test]
    fn zero_relist_interval_is_rejected() {
        let config = CollectorConfig::default().with_relist_databases_every(Duration::ZERO);
        assert_eq!(
            config.validate().unwrap_err().to_string(),
            "relist_databases_every must be positive"
        );
    }
}
