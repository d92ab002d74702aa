//! Observable retry decisions
//!
//! Every state transition of an in-flight call is reported to the client's
//! [`RetryObserver`]s. The engine itself never decides where diagnostics go.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rebound_domain::{ErrorKind, RequestDescriptor};
use tracing::{debug, error, info, warn};

/// What made an attempt retry-worthy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryTrigger {
    /// The response carried a retryable status code
    Status(u16),
    /// The transport failed with a retryable error kind
    Error(ErrorKind),
}

impl fmt::Display for RetryTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "status {status}"),
            Self::Error(kind) => write!(f, "error {kind}"),
        }
    }
}

/// Terminal value a call resolved with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A response the policy accepted or ran out of attempts on
    Response { status: u16 },
    /// A transport failure that was not retried further
    Error { kind: ErrorKind },
    /// The transport panicked mid-attempt
    Internal { message: String },
}

/// A state transition of one in-flight call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryEvent {
    /// Attempt `attempt` is being handed to the transport
    AttemptStarted { attempt: u32, max_attempts: u32 },
    /// Attempt `attempt` failed transiently; the next one runs after `delay`
    RetryScheduled { attempt: u32, delay: Duration, trigger: RetryTrigger },
    /// The call reached its terminal value after `attempts` attempts.
    /// `exhausted` is set when the final outcome was itself retryable.
    Resolved { attempts: u32, resolution: Resolution, exhausted: bool },
    /// The caller cancelled the call
    Cancelled { attempts: u32 },
}

/// Hook notified of every retry decision
pub trait RetryObserver: Send + Sync {
    fn on_event(&self, request: &RequestDescriptor, event: &RetryEvent);
}

/// Observer that emits structured `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RetryObserver for TracingObserver {
    fn on_event(&self, request: &RequestDescriptor, event: &RetryEvent) {
        let request_id = request.id();
        let method = request.method();
        let url = request.url();

        match event {
            RetryEvent::AttemptStarted { attempt, max_attempts } => {
                debug!(%request_id, %method, %url, attempt, max_attempts, "sending HTTP request");
            }
            RetryEvent::RetryScheduled { attempt, delay, trigger } => {
                warn!(
                    %request_id,
                    %method,
                    %url,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    %trigger,
                    "attempt failed, retry scheduled"
                );
            }
            RetryEvent::Resolved {
                attempts,
                resolution: Resolution::Response { status },
                exhausted,
            } => {
                if *exhausted {
                    warn!(%request_id, %method, %url, attempts, status, "retries exhausted");
                } else {
                    info!(%request_id, %method, %url, attempts, status, "request completed");
                }
            }
            RetryEvent::Resolved {
                attempts,
                resolution: Resolution::Error { kind },
                exhausted,
            } => {
                warn!(%request_id, %method, %url, attempts, %kind, exhausted, "request failed");
            }
            RetryEvent::Resolved { attempts, resolution: Resolution::Internal { message }, .. } => {
                error!(%request_id, %method, %url, attempts, %message, "transport panicked");
            }
            RetryEvent::Cancelled { attempts } => {
                info!(%request_id, %method, %url, attempts, "request cancelled");
            }
        }
    }
}

/// Observer keeping aggregate counters across all calls of a client
#[derive(Debug, Default)]
pub struct RetryStats {
    attempts: AtomicU64,
    retries: AtomicU64,
    resolved: AtomicU64,
    exhausted: AtomicU64,
    cancelled: AtomicU64,
}

/// Point-in-time copy of [`RetryStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryStatsSnapshot {
    pub attempts: u64,
    pub retries: u64,
    pub resolved: u64,
    pub exhausted: u64,
    pub cancelled: u64,
}

impl RetryStats {
    /// Counters starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every counter
    pub fn snapshot(&self) -> RetryStatsSnapshot {
        RetryStatsSnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            resolved: self.resolved.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}

impl RetryObserver for RetryStats {
    fn on_event(&self, _request: &RequestDescriptor, event: &RetryEvent) {
        match event {
            RetryEvent::AttemptStarted { .. } => {
                self.attempts.fetch_add(1, Ordering::Relaxed);
            }
            RetryEvent::RetryScheduled { .. } => {
                self.retries.fetch_add(1, Ordering::Relaxed);
            }
            RetryEvent::Resolved { exhausted, .. } => {
                self.resolved.fetch_add(1, Ordering::Relaxed);
                if *exhausted {
                    self.exhausted.fetch_add(1, Ordering::Relaxed);
                }
            }
            RetryEvent::Cancelled { .. } => {
                self.cancelled.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
