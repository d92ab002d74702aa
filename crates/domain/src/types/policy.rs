//! Immutable retry policy.
//!
//! Built once when a client is constructed and shared read-only by every call
//! the client makes.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error_kind::{ErrorKind, TransportError};
use crate::constants::{
    DEFAULT_BACKOFF_FACTOR, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY,
    DEFAULT_RETRYABLE_STATUS_RANGE, MAX_MAX_ATTEMPTS,
};
use crate::errors::{ReboundError, Result};

/// Randomization applied to each backoff delay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JitterMode {
    /// Use the computed delay as is
    None,
    /// Uniform in `[0, delay)`
    Full,
    /// Uniform in `[delay/2, delay)`
    #[default]
    Equal,
}

/// Retry configuration for one client instance.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_factor: f64,
    retryable_status_codes: BTreeSet<u16>,
    retryable_error_kinds: BTreeSet<ErrorKind>,
    attempt_timeout: Option<Duration>,
    jitter: JitterMode,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            retryable_status_codes: BTreeSet::new(),
            retryable_error_kinds: [ErrorKind::TRANSPORT].into_iter().collect(),
            attempt_timeout: None,
            jitter: JitterMode::Equal,
        }
    }
}

impl RetryPolicy {
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    /// Total attempts allowed, the first one included
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    /// Explicitly configured status codes; empty means the 5xx range
    pub fn retryable_status_codes(&self) -> &BTreeSet<u16> {
        &self.retryable_status_codes
    }

    pub fn retryable_error_kinds(&self) -> &BTreeSet<ErrorKind> {
        &self.retryable_error_kinds
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout
    }

    pub fn jitter(&self) -> JitterMode {
        self.jitter
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        if self.retryable_status_codes.is_empty() {
            DEFAULT_RETRYABLE_STATUS_RANGE.contains(&status)
        } else {
            self.retryable_status_codes.contains(&status)
        }
    }

    pub fn is_retryable_error(&self, error: &TransportError) -> bool {
        self.retryable_error_kinds.contains(error.kind())
    }

    /// Whether another attempt fits in the budget after `attempts_made`
    pub fn has_attempts_left(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }

    /// Timeout for each attempt: the policy override wins over the request's own.
    pub fn effective_timeout(&self, requested: Option<Duration>) -> Option<Duration> {
        self.attempt_timeout.or(requested)
    }

    /// Validate the policy
    ///
    /// # Errors
    /// Returns `ReboundError::Config` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_MAX_ATTEMPTS).contains(&self.max_attempts) {
            return Err(ReboundError::Config(format!(
                "max_attempts must be between 1 and {MAX_MAX_ATTEMPTS}, got {}",
                self.max_attempts
            )));
        }

        if self.base_delay > self.max_delay {
            return Err(ReboundError::Config(format!(
                "base_delay ({:?}) cannot be greater than max_delay ({:?})",
                self.base_delay, self.max_delay
            )));
        }

        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(ReboundError::Config(format!(
                "backoff_factor must be a finite number >= 1.0, got {}",
                self.backoff_factor
            )));
        }

        if let Some(code) = self.retryable_status_codes.iter().find(|c| !(100..=599).contains(*c))
        {
            return Err(ReboundError::Config(format!(
                "retryable status code {code} is not a valid HTTP status"
            )));
        }

        if self.attempt_timeout == Some(Duration::ZERO) {
            return Err(ReboundError::Config("attempt_timeout must be non-zero".to_string()));
        }

        Ok(())
    }
}

/// Builder for [`RetryPolicy`] with fluent API
#[derive(Debug, Default)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    pub fn new() -> Self {
        Self { policy: RetryPolicy::default() }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.policy.max_attempts = attempts;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.policy.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.policy.backoff_factor = factor;
        self
    }

    /// Replace the retryable status set. An empty set restores the 5xx default.
    pub fn retryable_status_codes<I: IntoIterator<Item = u16>>(mut self, codes: I) -> Self {
        self.policy.retryable_status_codes = codes.into_iter().collect();
        self
    }

    /// Replace the retryable error kind set.
    pub fn retryable_error_kinds<I, K>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<ErrorKind>,
    {
        self.policy.retryable_error_kinds = kinds.into_iter().map(Into::into).collect();
        self
    }

    /// Add one kind to the retryable set.
    pub fn retry_on_kind(mut self, kind: impl Into<ErrorKind>) -> Self {
        self.policy.retryable_error_kinds.insert(kind.into());
        self
    }

    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.policy.attempt_timeout = Some(timeout);
        self
    }

    pub fn jitter(mut self, jitter: JitterMode) -> Self {
        self.policy.jitter = jitter;
        self
    }

    pub fn no_jitter(self) -> Self {
        self.jitter(JitterMode::None)
    }

    /// Build and validate the policy
    ///
    /// # Errors
    /// Returns `ReboundError::Config` if the configuration is invalid.
    pub fn build(self) -> Result<RetryPolicy> {
        self.policy.validate()?;
        Ok(self.policy)
    }
}
