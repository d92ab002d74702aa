//! Completion handle returned by [`RetryingClient::submit`](super::RetryingClient::submit).

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use rebound_common::SettleCell;
use rebound_domain::{ErrorKind, RawResponse, ReboundError, TransportError};
use thiserror::Error;
use uuid::Uuid;

use super::call::Call;

/// Terminal error delivered on a handle's error channel
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The last attempt failed in the transport; the error is passed through verbatim
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The caller cancelled the call before it resolved
    #[error("request cancelled before completion")]
    Cancelled,

    /// The transport panicked; the call was failed before the panic was re-raised
    #[error("internal error: {0}")]
    Internal(String),
}

impl CallError {
    /// Kind tag of the underlying transport failure
    pub fn kind(&self) -> Option<&ErrorKind> {
        match self {
            Self::Transport(err) => Some(err.kind()),
            Self::Cancelled | Self::Internal(_) => None,
        }
    }

    /// Whether the caller cancelled the call
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<CallError> for ReboundError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Transport(err) => ReboundError::Network(err.to_string()),
            CallError::Cancelled => {
                ReboundError::Cancelled("request cancelled before completion".to_string())
            }
            CallError::Internal(message) => ReboundError::Internal(message),
        }
    }
}

/// Terminal result of one call
pub type CallResult = Result<RawResponse, CallError>;

/// What the settle cell stores
#[derive(Debug)]
pub(crate) struct Outcome {
    pub(crate) result: CallResult,
    pub(crate) attempts: u32,
}

/// The eventual result of one submitted request.
///
/// Resolves exactly once. Successful resolution carries whatever response
/// the retry policy accepted, including non-2xx statuses that are not
/// retryable; interpreting them is the caller's job.
///
/// The handle is itself a [`Future`]. Callers outside async code can use
/// [`wait`](Self::wait), and callback-style code can register continuations
/// with [`on_success`](Self::on_success) / [`on_error`](Self::on_error).
#[derive(Clone)]
pub struct CompletionHandle {
    call: Arc<Call>,
}

impl CompletionHandle {
    pub(crate) fn new(call: Arc<Call>) -> Self {
        Self { call }
    }

    #[cfg(test)]
    pub(crate) fn call_for_tests(&self) -> &Arc<Call> {
        &self.call
    }

    fn cell(&self) -> &SettleCell<Outcome> {
        self.call.cell()
    }

    /// Correlation id of the underlying request
    pub fn request_id(&self) -> Uuid {
        self.call.request_id()
    }

    pub fn is_resolved(&self) -> bool {
        self.cell().is_settled()
    }

    /// Attempts started so far; final once the handle has resolved
    pub fn attempts(&self) -> u32 {
        match self.cell().get() {
            Some(outcome) => outcome.attempts,
            None => self.call.attempts(),
        }
    }

    /// The terminal result, if the handle has resolved
    pub fn try_result(&self) -> Option<CallResult> {
        self.cell().get().map(|outcome| outcome.result.clone())
    }

    /// Run `continuation` with the accepted response
    pub fn on_success<F>(&self, continuation: F)
    where
        F: FnOnce(&RawResponse) + Send + 'static,
    {
        self.cell().on_settled(move |outcome| {
            if let Ok(response) = &outcome.result {
                continuation(response);
            }
        });
    }

    /// Run `continuation` with the terminal error
    pub fn on_error<F>(&self, continuation: F)
    where
        F: FnOnce(&CallError) + Send + 'static,
    {
        self.cell().on_settled(move |outcome| {
            if let Err(err) = &outcome.result {
                continuation(err);
            }
        });
    }

    /// Run `continuation` with the terminal result, whatever it is
    pub fn on_complete<F>(&self, continuation: F)
    where
        F: FnOnce(&CallResult) + Send + 'static,
    {
        self.cell().on_settled(move |outcome| continuation(&outcome.result));
    }

    /// Cancel the call.
    ///
    /// Returns `true` if this resolved the handle as [`CallError::Cancelled`];
    /// `false` if it had already resolved.
    pub fn cancel(&self) -> bool {
        self.call.cancel()
    }

    /// Block the current thread until the handle resolves.
    ///
    /// For synchronous callers only; inside async code `.await` the handle.
    pub fn wait(&self) -> CallResult {
        self.cell().wait().result.clone()
    }

    /// Block for at most `timeout`; `None` if still unresolved
    pub fn wait_timeout(&self, timeout: Duration) -> Option<CallResult> {
        self.cell().wait_timeout(timeout).map(|outcome| outcome.result.clone())
    }
}

impl Future for CompletionHandle {
    type Output = CallResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.cell().poll_settled(cx).map(|outcome| outcome.result.clone())
    }
}

impl fmt::Debug for CompletionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionHandle")
            .field("request_id", &self.request_id())
            .field("resolved", &self.is_resolved())
            .field("attempts", &self.attempts())
            .finish()
    }
}
