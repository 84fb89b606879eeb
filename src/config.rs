//! Observer configuration and environment loading.
//!
//! Values are read from `STATS_RECEIVER_*` environment variables with
//! sensible defaults. Invalid values fall back to defaults without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `STATS_RECEIVER_BUFFER_SEC` | 15 | Interval between forced flushes (secs) |
//! | `STATS_RECEIVER_TIMEOUT_SEC` | 1 | Max idle wait before re-checking the flush deadline (secs) |

use std::time::Duration;

use thiserror::Error;

const DEFAULT_REPORT_INTERVAL_SECS: u64 = 15;
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

/// Timing configuration for an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverConfig {
    /// Target period between flushes. The schedule floats: the next
    /// deadline is measured from the moment of the previous flush.
    pub report_interval: Duration,
    /// Max wait without traffic before the loop re-checks its deadline.
    pub idle_timeout: Duration,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            report_interval: Duration::from_secs(DEFAULT_REPORT_INTERVAL_SECS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }
}

impl ObserverConfig {
    /// Build a validated configuration.
    pub fn new(report_interval: Duration, idle_timeout: Duration) -> Result<Self, ConfigError> {
        let config = Self { report_interval, idle_timeout };
        config.validate()?;
        Ok(config)
    }

    /// Reject durations the loop cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.report_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("report_interval"));
        }
        if self.idle_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("idle_timeout"));
        }
        Ok(())
    }

    /// Replace zero durations with their defaults.
    pub fn or_defaults(self) -> Self {
        let defaults = Self::default();
        Self {
            report_interval: if self.report_interval.is_zero() {
                defaults.report_interval
            } else {
                self.report_interval
            },
            idle_timeout: if self.idle_timeout.is_zero() {
                defaults.idle_timeout
            } else {
                self.idle_timeout
            },
        }
    }

    /// Load from environment, falling back to defaults per field.
    pub fn from_env() -> Self {
        let report_secs = parse_secs("STATS_RECEIVER_BUFFER_SEC", DEFAULT_REPORT_INTERVAL_SECS);
        let idle_secs = parse_secs("STATS_RECEIVER_TIMEOUT_SEC", DEFAULT_IDLE_TIMEOUT_SECS);
        Self {
            report_interval: Duration::from_secs(report_secs),
            idle_timeout: Duration::from_secs(idle_secs),
        }
    }
}

/// Parse a positive seconds value, returning `default` on missing, invalid or zero.
fn parse_secs(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => match val.trim().parse::<u64>() {
            Ok(0) | Err(_) => default,
            Ok(secs) => secs,
        },
        Err(_) => default,
    }
}
