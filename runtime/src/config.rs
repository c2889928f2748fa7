//! Configuration management for the helpdesk runtime.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Unparseable values fall back to the default rather than failing startup.

use crate::retry::RetryPolicy;
use helpdesk_engine::{EngineConfig, InvalidEnumPolicy, UnscheduledPolicy};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Engine policies
    pub engine: EngineConfig,
    /// Commit retry settings
    pub store: StoreConfig,
    /// Tracing filter directive (`RUST_LOG`)
    pub log_level: String,
}

/// Commit retry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Re-evaluations after a version conflict before giving up
    pub max_conflict_retries: usize,
    /// Delay before the first re-evaluation, in milliseconds
    pub retry_initial_delay_ms: u64,
    /// Backoff cap, in milliseconds
    pub retry_max_delay_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 3,
            retry_initial_delay_ms: 10,
            retry_max_delay_ms: 500,
        }
    }
}

impl StoreConfig {
    /// Backoff policy for conflicting commits.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(self.max_conflict_retries)
            .initial_delay(Duration::from_millis(self.retry_initial_delay_ms))
            .max_delay(Duration::from_millis(self.retry_max_delay_ms))
            .build()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            store: StoreConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Used by [`Config::from_env`] and by tests that must not touch the
    /// process environment.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            engine: EngineConfig {
                invalid_enum_policy: lookup("HELPDESK_INVALID_ENUM_POLICY")
                    .and_then(|s| s.parse::<InvalidEnumPolicy>().ok())
                    .unwrap_or_default(),
                support_distribution: lookup("HELPDESK_SUPPORT_DISTRIBUTION")
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or(defaults.engine.support_distribution),
                unscheduled_overdue: lookup("HELPDESK_UNSCHEDULED_OVERDUE")
                    .and_then(|s| s.parse::<UnscheduledPolicy>().ok())
                    .unwrap_or_default(),
            },
            store: StoreConfig {
                max_conflict_retries: lookup("HELPDESK_MAX_CONFLICT_RETRIES")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.store.max_conflict_retries),
                retry_initial_delay_ms: lookup("HELPDESK_RETRY_INITIAL_DELAY_MS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.store.retry_initial_delay_ms),
                retry_max_delay_ms: lookup("HELPDESK_RETRY_MAX_DELAY_MS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.store.retry_max_delay_ms),
            },
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
        }
    }
}
