//! Configuration management for the todo application.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Unlike a missing variable, a malformed one is an error.

use crate::bridge::{BridgeConfig, BridgeMode, MissingText};
use crate::reducer::DEFAULT_WORKER_SCRIPT;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;
use todo_ports_runtime::StoreConfig;

/// Bridge mode variable
pub const BRIDGE_MODE: &str = "TODO_BRIDGE_MODE";
/// Missing-text policy variable
pub const MISSING_TEXT: &str = "TODO_MISSING_TEXT";
/// Worker registration switch variable
pub const REGISTER_WORKER: &str = "TODO_REGISTER_WORKER";
/// Worker script variable
pub const WORKER_SCRIPT: &str = "TODO_WORKER_SCRIPT";
/// Shutdown timeout variable, in seconds
pub const SHUTDOWN_TIMEOUT: &str = "TODO_SHUTDOWN_TIMEOUT";
/// Action broadcast capacity variable
pub const BROADCAST_CAPACITY: &str = "TODO_BROADCAST_CAPACITY";

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set to a value that cannot be used
    #[error("invalid {key}='{value}': {reason}")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Offending value
        value: String,
        /// Why it was refused
        reason: String,
    },
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Bridge behavior
    pub bridge: BridgeConfig,
    /// Register the caching worker at boot
    pub register_worker: bool,
    /// Path of the caching worker script
    pub worker_script: String,
    /// Seconds allowed for settling and stopping
    pub shutdown_timeout: u64,
    /// Buffer size of the action broadcast
    pub broadcast_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bridge: BridgeConfig::default(),
            register_worker: true,
            worker_script: DEFAULT_WORKER_SCRIPT.to_string(),
            shutdown_timeout: 5,
            broadcast_capacity: 1024,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a variable is set to a value that
    /// cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns the value of a
    /// variable if it is set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a variable is set to a value that
    /// cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let mode = parse(&lookup, BRIDGE_MODE, str::parse::<BridgeMode>)?
            .unwrap_or(defaults.bridge.mode);
        let missing_text = parse(&lookup, MISSING_TEXT, str::parse::<MissingText>)?
            .unwrap_or(defaults.bridge.missing_text);
        let register_worker =
            parse(&lookup, REGISTER_WORKER, parse_bool)?.unwrap_or(defaults.register_worker);
        let worker_script = parse(&lookup, WORKER_SCRIPT, parse_non_empty)?
            .unwrap_or(defaults.worker_script);
        let shutdown_timeout = parse(&lookup, SHUTDOWN_TIMEOUT, parse_number)?
            .unwrap_or(defaults.shutdown_timeout);
        let broadcast_capacity = parse(&lookup, BROADCAST_CAPACITY, parse_capacity)?
            .unwrap_or(defaults.broadcast_capacity);

        Ok(Self {
            bridge: BridgeConfig::new(mode).with_missing_text(missing_text),
            register_worker,
            worker_script,
            shutdown_timeout,
            broadcast_capacity,
        })
    }

    /// Shutdown timeout as a duration
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }

    /// Store settings derived from this configuration
    #[must_use]
    pub const fn store_config(&self) -> StoreConfig {
        StoreConfig::new(self.broadcast_capacity, self.shutdown_timeout())
    }
}

fn parse<F, T, P>(lookup: &F, key: &'static str, parser: P) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    P: Fn(&str) -> Result<T, String>,
{
    let Some(value) = lookup(key) else {
        return Ok(None);
    };
    parser(&value)
        .map(Some)
        .map_err(|reason| ConfigError::Invalid { key, value, reason })
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err("expected true/false, 1/0 or yes/no".to_string()),
    }
}

fn parse_number(value: &str) -> Result<u64, String> {
    value.trim().parse().map_err(|e| format!("{e}"))
}

fn parse_capacity(value: &str) -> Result<usize, String> {
    match value.trim().parse::<usize>() {
        Ok(0) => Err("capacity must be at least 1".to_string()),
        Ok(capacity) => Ok(capacity),
        Err(e) => Err(format!("{e}")),
    }
}

fn parse_non_empty(value: &str) -> Result<String, String> {
    let value = value.trim();
    if value.is_empty() {
        Err("must not be empty".to_string())
    } else {
        Ok(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.bridge.mode, BridgeMode::Reconstruct);
        assert_eq!(config.bridge.missing_text, MissingText::PassThrough);
        assert!(config.register_worker);
        assert_eq!(config.worker_script, "/service-worker.js");
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn reads_every_variable() {
        let config = AppConfig::from_lookup(lookup(&[
            (BRIDGE_MODE, "in-place"),
            (MISSING_TEXT, "reject"),
            (REGISTER_WORKER, "no"),
            (WORKER_SCRIPT, "/static/sw.js"),
            (SHUTDOWN_TIMEOUT, "12"),
            (BROADCAST_CAPACITY, "8"),
        ]))
        .unwrap();

        assert_eq!(config.bridge.mode, BridgeMode::InPlace);
        assert_eq!(config.bridge.missing_text, MissingText::Reject);
        assert!(!config.register_worker);
        assert_eq!(config.worker_script, "/static/sw.js");
        assert_eq!(config.shutdown_timeout, 12);
        assert_eq!(config.broadcast_capacity, 8);
    }

    #[test]
    fn invalid_values_are_errors() {
        let error = AppConfig::from_lookup(lookup(&[(BRIDGE_MODE, "sideways")])).unwrap_err();
        assert!(matches!(
            error,
            ConfigError::Invalid { key: BRIDGE_MODE, .. }
        ));

        for (key, value) in [
            (MISSING_TEXT, "ignore"),
            (REGISTER_WORKER, "maybe"),
            (WORKER_SCRIPT, "  "),
            (SHUTDOWN_TIMEOUT, "-1"),
            (BROADCAST_CAPACITY, "0"),
        ] {
            let error = AppConfig::from_lookup(lookup(&[(key, value)])).unwrap_err();
            let ConfigError::Invalid { key: reported, .. } = error;
            assert_eq!(reported, key);
        }
    }

    #[test]
    fn error_message_names_variable() {
        let error =
            AppConfig::from_lookup(lookup(&[(REGISTER_WORKER, "maybe")])).unwrap_err();
        assert_eq!(
            error.to_string(),
            "invalid TODO_REGISTER_WORKER='maybe': expected true/false, 1/0 or yes/no"
        );
    }
}
