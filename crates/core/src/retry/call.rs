//! Per-call retry state machine.
//!
//! ```text
//! PENDING --transport done--> EVALUATING --retryable, budget left--> RETRY_SCHEDULED
//!    ^                            |                                        |
//!    +----------------------------|-------------timer fires----------------+
//!                                 +--otherwise--> RESOLVED
//! ```
//!
//! Every path into `RESOLVED` goes through the call's [`SettleCell`], so a
//! cancellation racing a transport completion (or a duplicate completion)
//! can never resolve the handle twice.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use rebound_common::SettleCell;
use rebound_domain::{RawResponse, RequestDescriptor, TransportError};
use uuid::Uuid;

use super::client::ClientShared;
use super::events::{Resolution, RetryEvent, RetryTrigger};
use super::handle::{CallError, Outcome};
use super::ports::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallPhase {
    Pending,
    Evaluating,
    RetryScheduled,
    Resolved,
}

/// Mutable bookkeeping owned by exactly one call
#[derive(Debug)]
pub(crate) struct AttemptState {
    attempts: u32,
    phase: CallPhase,
    in_flight: Option<CancellationToken>,
    retry_timer: Option<CancellationToken>,
}

impl AttemptState {
    fn new() -> Self {
        Self { attempts: 0, phase: CallPhase::Pending, in_flight: None, retry_timer: None }
    }
}

/// One in-flight logical request
pub(crate) struct Call {
    descriptor: Arc<RequestDescriptor>,
    timeout: Option<Duration>,
    shared: Arc<ClientShared>,
    cell: SettleCell<Outcome>,
    state: Mutex<AttemptState>,
}

impl Call {
    /// Create the call and launch its first attempt
    pub(crate) fn start(shared: Arc<ClientShared>, descriptor: RequestDescriptor) -> Arc<Self> {
        let timeout = shared.policy.effective_timeout(descriptor.timeout());
        let call = Arc::new(Self {
            descriptor: Arc::new(descriptor),
            timeout,
            shared,
            cell: SettleCell::new(),
            state: Mutex::new(AttemptState::new()),
        });
        call.start_attempt();
        call
    }

    pub(crate) fn cell(&self) -> &SettleCell<Outcome> {
        &self.cell
    }

    pub(crate) fn request_id(&self) -> Uuid {
        self.descriptor.id()
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.state.lock().attempts
    }

    #[cfg(test)]
    pub(crate) fn phase(&self) -> CallPhase {
        self.state.lock().phase
    }

    fn emit(&self, event: &RetryEvent) {
        self.shared.emit(&self.descriptor, event);
    }

    fn start_attempt(self: &Arc<Self>) {
        let attempt = {
            let mut state = self.state.lock();
            if state.phase == CallPhase::Resolved || self.cell.is_settled() {
                return;
            }
            state.attempts += 1;
            state.phase = CallPhase::Pending;
            state.retry_timer = None;
            state.attempts
        };

        self.emit(&RetryEvent::AttemptStarted {
            attempt,
            max_attempts: self.shared.policy.max_attempts(),
        });

        let call = Arc::clone(self);
        let token = self.shared.scheduler.spawn(Box::pin(async move {
            let send = call.shared.transport.send(&call.descriptor, call.timeout);
            match AssertUnwindSafe(send).catch_unwind().await {
                Ok(outcome) => call.evaluate(attempt, outcome),
                Err(payload) => {
                    call.fail(attempt, panic_message(payload.as_ref()));
                    panic::resume_unwind(payload);
                }
            }
        }));

        let mut state = self.state.lock();
        if state.phase == CallPhase::Resolved {
            drop(state);
            token.cancel();
        } else if state.attempts == attempt && state.phase == CallPhase::Pending {
            state.in_flight = Some(token);
        }
    }

    /// Decide what attempt `attempt`'s outcome means for the call.
    ///
    /// Completions for an attempt that is no longer current are ignored.
    pub(crate) fn evaluate(
        self: &Arc<Self>,
        attempt: u32,
        outcome: Result<RawResponse, TransportError>,
    ) {
        let mut state = self.state.lock();
        if state.attempts != attempt || state.phase != CallPhase::Pending || self.cell.is_settled()
        {
            return;
        }
        state.phase = CallPhase::Evaluating;
        state.in_flight = None;

        let policy = &self.shared.policy;
        let trigger = match &outcome {
            Ok(response) if policy.is_retryable_status(response.status()) => {
                Some(RetryTrigger::Status(response.status()))
            }
            Err(err) if policy.is_retryable_error(err) => {
                Some(RetryTrigger::Error(err.kind().clone()))
            }
            _ => None,
        };

        match trigger {
            Some(trigger) if policy.has_attempts_left(attempt) => {
                state.phase = CallPhase::RetryScheduled;
                drop(state);
                self.schedule_retry(attempt, trigger);
            }
            trigger => {
                state.phase = CallPhase::Resolved;
                drop(state);
                self.resolve(attempt, outcome, trigger.is_some());
            }
        }
    }

    fn schedule_retry(self: &Arc<Self>, attempt: u32, trigger: RetryTrigger) {
        let delay = self.shared.backoff.delay(attempt);
        self.emit(&RetryEvent::RetryScheduled { attempt, delay, trigger });

        let call = Arc::clone(self);
        let token =
            self.shared.scheduler.schedule_after(delay, Box::new(move || call.start_attempt()));

        let mut state = self.state.lock();
        if state.phase == CallPhase::Resolved {
            drop(state);
            token.cancel();
        } else if state.attempts == attempt && state.phase == CallPhase::RetryScheduled {
            state.retry_timer = Some(token);
        }
    }

    fn resolve(
        &self,
        attempts: u32,
        outcome: Result<RawResponse, TransportError>,
        exhausted: bool,
    ) {
        let resolution = match &outcome {
            Ok(response) => Resolution::Response { status: response.status() },
            Err(err) => Resolution::Error { kind: err.kind().clone() },
        };
        let result = outcome.map_err(CallError::from);

        if self.cell.settle(Outcome { result, attempts }) {
            self.emit(&RetryEvent::Resolved { attempts, resolution, exhausted });
        }
    }

    /// Resolve with [`CallError::Internal`] after attempt `attempt` panicked
    /// in the transport. The panic itself is re-raised by the caller.
    fn fail(&self, attempt: u32, message: String) {
        {
            let mut state = self.state.lock();
            if state.attempts != attempt || state.phase != CallPhase::Pending {
                return;
            }
            state.phase = CallPhase::Resolved;
            state.in_flight = None;
        }

        let resolution = Resolution::Internal { message: message.clone() };
        let result = Err(CallError::Internal(message));
        if self.cell.settle(Outcome { result, attempts: attempt }) {
            self.emit(&RetryEvent::Resolved { attempts: attempt, resolution, exhausted: false });
        }
    }

    /// Resolve as cancelled, stopping any pending timer and in-flight attempt
    pub(crate) fn cancel(&self) -> bool {
        let attempts = self.state.lock().attempts;
        if !self.cell.settle(Outcome { result: Err(CallError::Cancelled), attempts }) {
            return false;
        }

        let (in_flight, retry_timer) = {
            let mut state = self.state.lock();
            state.phase = CallPhase::Resolved;
            (state.in_flight.take(), state.retry_timer.take())
        };
        if let Some(token) = retry_timer {
            token.cancel();
        }
        if let Some(token) = in_flight {
            token.cancel();
        }

        self.emit(&RetryEvent::Cancelled { attempts });
        true
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload");
    format!("transport panicked: {detail}")
}
