//! Runtime configuration read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use courier_application::DEFAULT_SCRIPT_TIMEOUT;
use courier_infrastructure::DEFAULT_REQUEST_TIMEOUT;
use thiserror::Error;

/// Snapshot file location.
pub const STATE_PATH_VAR: &str = "COURIER_STATE_PATH";
/// Script budget in milliseconds.
pub const SCRIPT_TIMEOUT_VAR: &str = "COURIER_SCRIPT_TIMEOUT_MS";
/// Transport timeout in milliseconds.
pub const REQUEST_TIMEOUT_VAR: &str = "COURIER_REQUEST_TIMEOUT_MS";

/// Invalid configuration value.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{name} must be a positive number of milliseconds, got '{value}'")]
pub struct ConfigError {
    /// Variable name
    pub name: &'static str,
    /// Rejected value
    pub value: String,
}

/// Settings for one run of the binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Explicit snapshot path; the platform config dir is used otherwise
    pub state_path: Option<PathBuf>,
    /// Budget for each script
    pub script_timeout: Duration,
    /// Timeout for each HTTP request
    pub request_timeout: Duration,
}

impl AppConfig {
    /// Reads the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            state_path: lookup(STATE_PATH_VAR)
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from),
            script_timeout: millis(&lookup, SCRIPT_TIMEOUT_VAR, DEFAULT_SCRIPT_TIMEOUT)?,
            request_timeout: millis(&lookup, REQUEST_TIMEOUT_VAR, DEFAULT_REQUEST_TIMEOUT)?,
        })
    }
}

fn millis(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let Some(value) = lookup(name) else {
        return Ok(default);
    };
    match value.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(ConfigError { name, value }),
    }
}
