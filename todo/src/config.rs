//! Configuration management for the to-do application.
//!
//! Loads configuration from `REXLIST_*` environment variables with sensible
//! defaults. Unparseable values fall back to the default; [`AppConfig::validate`]
//! rejects values that parse but make no sense.

use crate::middleware::PersistenceSettings;
use crate::persistence::TaskFilter;
use rexlist_runtime::{RetryPolicy, StoreConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A value is outside its allowed range
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue {
        /// Environment variable holding the value
        key: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// JSON file the task list is kept in; in memory when unset
    pub data_file: Option<PathBuf>,
    /// `tracing` filter directive used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Address of the Prometheus endpoint; metrics are off when unset
    pub metrics_addr: Option<SocketAddr>,
    /// Attempts per storage operation, including the first
    pub retry_max_attempts: u32,
    /// Backoff before the first retry, in milliseconds
    pub retry_initial_delay_ms: u64,
    /// Reopen the change stream after it fails
    pub resubscribe_on_failure: bool,
    /// Emit `TaskNotFound` diagnostics for edits of unknown tasks
    pub report_missing_tasks: bool,
    /// Capacity of the store's action broadcast
    pub broadcast_capacity: usize,
    /// How long shutdown waits for running effects, in milliseconds
    pub shutdown_timeout_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_file: None,
            log_filter: "info".to_string(),
            metrics_addr: None,
            retry_max_attempts: 3,
            retry_initial_delay_ms: 100,
            resubscribe_on_failure: true,
            report_missing_tasks: false,
            broadcast_capacity: 16,
            shutdown_timeout_ms: 5000,
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            data_file: lookup("REXLIST_DATA_FILE")
                .filter(|path| !path.is_empty())
                .map(PathBuf::from),
            log_filter: lookup("REXLIST_LOG").unwrap_or(defaults.log_filter),
            metrics_addr: parse_var(&lookup, "REXLIST_METRICS_ADDR"),
            retry_max_attempts: parse_var(&lookup, "REXLIST_RETRY_MAX_ATTEMPTS").unwrap_or(defaults.retry_max_attempts),
            retry_initial_delay_ms: parse_var(&lookup, "REXLIST_RETRY_INITIAL_DELAY_MS")
                .unwrap_or(defaults.retry_initial_delay_ms),
            resubscribe_on_failure: parse_var(&lookup, "REXLIST_RESUBSCRIBE_ON_FAILURE")
                .unwrap_or(defaults.resubscribe_on_failure),
            report_missing_tasks: parse_var(&lookup, "REXLIST_REPORT_MISSING_TASKS").unwrap_or(defaults.report_missing_tasks),
            broadcast_capacity: parse_var(&lookup, "REXLIST_BROADCAST_CAPACITY").unwrap_or(defaults.broadcast_capacity),
            shutdown_timeout_ms: parse_var(&lookup, "REXLIST_SHUTDOWN_TIMEOUT_MS").unwrap_or(defaults.shutdown_timeout_ms),
        }
    }

    /// Check that every value is usable
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for the first value out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "REXLIST_RETRY_MAX_ATTEMPTS",
                reason: "at least one attempt is required".to_string(),
            });
        }
        if self.broadcast_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "REXLIST_BROADCAST_CAPACITY",
                reason: "capacity must be positive".to_string(),
            });
        }
        if self.shutdown_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "REXLIST_SHUTDOWN_TIMEOUT_MS",
                reason: "timeout must be positive".to_string(),
            });
        }
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "REXLIST_LOG",
                reason: "filter must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Retry policy for storage operations
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(self.retry_max_attempts)
            .with_initial_delay(Duration::from_millis(self.retry_initial_delay_ms))
    }

    /// Settings of the persistence middleware
    #[must_use]
    pub const fn persistence_settings(&self) -> PersistenceSettings {
        PersistenceSettings {
            retry: self.retry_policy(),
            resubscribe_on_failure: self.resubscribe_on_failure,
            report_missing_tasks: self.report_missing_tasks,
            filter: TaskFilter::All,
        }
    }

    /// Store configuration
    #[must_use]
    pub const fn store_config(&self) -> StoreConfig {
        StoreConfig::new(self.broadcast_capacity, self.shutdown_timeout())
    }

    /// How long shutdown waits for running effects
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|value| value.trim().parse().ok())
}
