//! Port interfaces for retrying HTTP calls
//!
//! The retry engine never performs I/O or sleeps itself. It talks to a
//! [`Transport`] for byte transmission and to a [`Scheduler`] for running
//! tasks and timers; adapters for both live in `rebound-infra`.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use rebound_domain::{RawResponse, RequestDescriptor, TransportError};

/// Trait for sending one HTTP attempt
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` once and wait for the complete response.
    ///
    /// `timeout` is the effective per-attempt timeout. Every failure that
    /// happens before a response exists, including ones detected before any
    /// I/O starts, must be reported as a classified [`TransportError`].
    async fn send(
        &self,
        request: &RequestDescriptor,
        timeout: Option<Duration>,
    ) -> Result<RawResponse, TransportError>;
}

/// Trait for running tasks and one-shot timers without blocking the caller
pub trait Scheduler: Send + Sync {
    /// Start `task` now on the scheduler's executor
    fn spawn(&self, task: BoxFuture<'static, ()>) -> CancellationToken;

    /// Run `callback` once, asynchronously, no sooner than `delay` from now
    fn schedule_after(
        &self,
        delay: Duration,
        callback: Box<dyn FnOnce() + Send + 'static>,
    ) -> CancellationToken;
}

/// Handle for cancelling a spawned task or pending timer.
///
/// Dropping the token detaches it; only [`cancel`](Self::cancel) stops the work.
pub struct CancellationToken {
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl CancellationToken {
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self { cancel: Some(Box::new(cancel)) }
    }

    /// A token for work that cannot be cancelled
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken").field("cancellable", &self.cancel.is_some()).finish()
    }
}
