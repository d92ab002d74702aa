//! Default values for retry policies and transport settings.

use std::ops::RangeInclusive;
use std::time::Duration;

/// Default total number of attempts (initial try + retries)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the first retry, before jitter
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(200);

/// Default cap on a single backoff delay, before jitter
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Default multiplier applied per additional attempt
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Status codes treated as transient when a policy configures none explicitly
pub const DEFAULT_RETRYABLE_STATUS_RANGE: RangeInclusive<u16> = 500..=599;

/// Default whole-request timeout applied by the HTTP transport
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connect timeout applied by the HTTP transport
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default `User-Agent` header sent by the HTTP transport
pub const DEFAULT_USER_AGENT: &str = concat!("rebound/", env!("CARGO_PKG_VERSION"));

/// Upper bound accepted for `max_attempts`
pub const MAX_MAX_ATTEMPTS: u32 = 100;
