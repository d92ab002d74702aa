//! Serde-facing configuration.
//!
//! Durations are expressed as fractional seconds so that configuration files
//! and environment variables stay human-editable. [`RetrySettings::to_policy`]
//! validates and converts them into an immutable [`RetryPolicy`].

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BACKOFF_FACTOR, DEFAULT_BASE_DELAY, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_DELAY, DEFAULT_REQUEST_TIMEOUT, DEFAULT_USER_AGENT,
};
use crate::errors::{ReboundError, Result};
use crate::types::{ErrorKind, JitterMode, RetryPolicy};

/// Top-level client configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub retry: RetrySettings,
    pub transport: TransportSettings,
}

/// Retry behaviour as written in configuration sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_seconds: f64,
    pub max_delay_seconds: f64,
    pub backoff_factor: f64,
    pub retryable_status_codes: Vec<u16>,
    pub retryable_error_kinds: Vec<ErrorKind>,
    pub attempt_timeout_seconds: Option<f64>,
    pub jitter: JitterMode,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_seconds: DEFAULT_BASE_DELAY.as_secs_f64(),
            max_delay_seconds: DEFAULT_MAX_DELAY.as_secs_f64(),
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            retryable_status_codes: Vec::new(),
            retryable_error_kinds: vec![ErrorKind::TRANSPORT],
            attempt_timeout_seconds: None,
            jitter: JitterMode::Equal,
        }
    }
}

impl RetrySettings {
    /// Convert into a validated [`RetryPolicy`].
    ///
    /// # Errors
    /// Returns `ReboundError::Config` for negative or non-finite durations and
    /// for any constraint rejected by [`RetryPolicy::validate`].
    pub fn to_policy(&self) -> Result<RetryPolicy> {
        let mut builder = RetryPolicy::builder()
            .max_attempts(self.max_attempts)
            .base_delay(seconds("base_delay_seconds", self.base_delay_seconds)?)
            .max_delay(seconds("max_delay_seconds", self.max_delay_seconds)?)
            .backoff_factor(self.backoff_factor)
            .retryable_status_codes(self.retryable_status_codes.iter().copied())
            .retryable_error_kinds(self.retryable_error_kinds.iter().cloned())
            .jitter(self.jitter);

        if let Some(timeout) = self.attempt_timeout_seconds {
            builder = builder.attempt_timeout(seconds("attempt_timeout_seconds", timeout)?);
        }

        builder.build()
    }
}

/// HTTP transport settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    pub request_timeout_seconds: f64,
    pub connect_timeout_seconds: f64,
    pub user_agent: String,
    pub default_headers: BTreeMap<String, String>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT.as_secs_f64(),
            connect_timeout_seconds: DEFAULT_CONNECT_TIMEOUT.as_secs_f64(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            default_headers: BTreeMap::new(),
        }
    }
}

impl TransportSettings {
    /// # Errors
    /// Returns `ReboundError::Config` if the value is negative or not finite.
    pub fn request_timeout(&self) -> Result<Duration> {
        seconds("request_timeout_seconds", self.request_timeout_seconds)
    }

    /// # Errors
    /// Returns `ReboundError::Config` if the value is negative or not finite.
    pub fn connect_timeout(&self) -> Result<Duration> {
        seconds("connect_timeout_seconds", self.connect_timeout_seconds)
    }
}

fn seconds(field: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| ReboundError::Config(format!("{field} must be a non-negative number: {e}")))
}
