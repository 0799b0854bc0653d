//! Client configuration.
//!
//! The base URL is supplied at startup, usually from the environment:
//!
//! - `PETGROOM_API_URL` (required), e.g. `http://localhost:3000/api`
//! - `PETGROOM_API_TIMEOUT_SECS` (optional, default 15)

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

pub const ENV_API_URL: &str = "PETGROOM_API_URL";
pub const ENV_API_TIMEOUT: &str = "PETGROOM_API_TIMEOUT_SECS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL without a trailing slash.
    pub base_url: String,
    /// Applied to requests that do not carry their own timeout.
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup; `from_env` uses the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup(ENV_API_URL)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(ENV_API_URL))?;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                name: ENV_API_URL,
                value: base_url,
                reason: "expected an http:// or https:// URL",
            });
        }

        let mut config = Self::new(base_url.trim());
        if let Some(raw) = lookup(ENV_API_TIMEOUT) {
            let secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    name: ENV_API_TIMEOUT,
                    value: raw.clone(),
                    reason: "expected a positive number of seconds",
                })?;
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}
