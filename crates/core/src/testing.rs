//! Test doubles for the retry ports
//!
//! Available to this crate's unit tests and, behind the `test-utils`
//! feature, to integration tests and downstream crates.

#![allow(clippy::missing_panics_doc)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use rebound_domain::{RawResponse, RequestDescriptor, TransportError};
use tokio::runtime::Handle;

use crate::retry::{CancellationToken, Scheduler, Transport};

pub type ScriptedOutcome = Result<RawResponse, TransportError>;

/// A request as the transport saw it
#[derive(Debug, Clone)]
pub struct RecordedSend {
    pub request: RequestDescriptor,
    pub timeout: Option<Duration>,
}

/// Transport that replays a fixed script of outcomes.
///
/// Once the script runs out, the fallback outcome (a `200` by default) is
/// returned for every further send.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<ScriptedOutcome>>,
    fallback: ScriptedOutcome,
    latency: Option<Duration>,
    sends: Mutex<Vec<RecordedSend>>,
}

impl ScriptedTransport {
    pub fn new<I>(script: I) -> Self
    where
        I: IntoIterator<Item = ScriptedOutcome>,
    {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback: Ok(RawResponse::with_status(200)),
            latency: None,
            sends: Mutex::new(Vec::new()),
        }
    }

    /// Script of bare responses with the given status codes
    pub fn statuses<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = u16>,
    {
        Self::new(statuses.into_iter().map(|status| Ok(RawResponse::with_status(status))))
    }

    /// Outcome returned once the script is exhausted
    pub fn with_fallback(mut self, fallback: ScriptedOutcome) -> Self {
        self.fallback = fallback;
        self
    }

    /// Sleep on the tokio timer before answering each send
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> usize {
        self.sends.lock().len()
    }

    pub fn sends(&self) -> Vec<RecordedSend> {
        self.sends.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        request: &RequestDescriptor,
        timeout: Option<Duration>,
    ) -> Result<RawResponse, TransportError> {
        self.sends.lock().push(RecordedSend { request: request.clone(), timeout });

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

/// Scheduler on the current tokio runtime that records every timer request.
///
/// Delays are multiplied by `time_scale` before sleeping, so tests can
/// assert on the computed backoff without actually waiting for it. The
/// default scale is zero.
pub struct RecordingScheduler {
    handle: Handle,
    time_scale: f64,
    delays: Arc<Mutex<Vec<Duration>>>,
    cancellations: Arc<AtomicUsize>,
}

impl RecordingScheduler {
    /// Must be called from inside a tokio runtime
    pub fn new() -> Self {
        Self::with_time_scale(0.0)
    }

    pub fn with_time_scale(time_scale: f64) -> Self {
        Self {
            handle: Handle::current(),
            time_scale,
            delays: Arc::new(Mutex::new(Vec::new())),
            cancellations: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Backoff delays requested so far, in order
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }

    /// Number of tokens that were cancelled
    pub fn cancellations(&self) -> usize {
        self.cancellations.load(Ordering::SeqCst)
    }

    fn counting_abort(&self, join: tokio::task::JoinHandle<()>) -> CancellationToken {
        let cancellations = Arc::clone(&self.cancellations);
        CancellationToken::new(move || {
            cancellations.fetch_add(1, Ordering::SeqCst);
            join.abort();
        })
    }
}

impl Default for RecordingScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for RecordingScheduler {
    fn spawn(&self, task: BoxFuture<'static, ()>) -> CancellationToken {
        let join = self.handle.spawn(task);
        self.counting_abort(join)
    }

    fn schedule_after(
        &self,
        delay: Duration,
        callback: Box<dyn FnOnce() + Send + 'static>,
    ) -> CancellationToken {
        self.delays.lock().push(delay);
        let sleep_for = delay.mul_f64(self.time_scale);
        let join = self.handle.spawn(async move {
            tokio::time::sleep(sleep_for).await;
            callback();
        });
        self.counting_abort(join)
    }
}

struct QueuedTask {
    task: BoxFuture<'static, ()>,
    cancelled: Arc<AtomicBool>,
}

struct QueuedTimer {
    delay: Duration,
    callback: Box<dyn FnOnce() + Send + 'static>,
    cancelled: Arc<AtomicBool>,
}

#[derive(Default)]
struct ManualQueue {
    tasks: VecDeque<QueuedTask>,
    timers: VecDeque<QueuedTimer>,
    delays: Vec<Duration>,
}

/// Scheduler that only makes progress when the test tells it to.
///
/// Spawned tasks are queued until [`run_tasks`](Self::run_tasks) drives them
/// on the calling thread; timers fire in submission order through
/// [`fire_next_timer`](Self::fire_next_timer), whatever their delay.
#[derive(Default)]
pub struct ManualScheduler {
    queue: Mutex<ManualQueue>,
    cancellations: Arc<AtomicUsize>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn token(&self) -> (Arc<AtomicBool>, CancellationToken) {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let cancellations = Arc::clone(&self.cancellations);
        let token = CancellationToken::new(move || {
            if !flag.swap(true, Ordering::SeqCst) {
                cancellations.fetch_add(1, Ordering::SeqCst);
            }
        });
        (cancelled, token)
    }

    /// Drive every queued task to completion; returns how many ran
    pub fn run_tasks(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.queue.lock().tasks.pop_front();
            let Some(queued) = next else {
                return ran;
            };
            if !queued.cancelled.load(Ordering::SeqCst) {
                futures::executor::block_on(queued.task);
                ran += 1;
            }
        }
    }

    /// Fire the oldest live timer; `false` if none is pending
    pub fn fire_next_timer(&self) -> bool {
        loop {
            let next = self.queue.lock().timers.pop_front();
            let Some(timer) = next else {
                return false;
            };
            if !timer.cancelled.load(Ordering::SeqCst) {
                (timer.callback)();
                return true;
            }
        }
    }

    pub fn queued_tasks(&self) -> usize {
        self.queue.lock().tasks.iter().filter(|t| !t.cancelled.load(Ordering::SeqCst)).count()
    }

    pub fn pending_timers(&self) -> usize {
        self.queue.lock().timers.iter().filter(|t| !t.cancelled.load(Ordering::SeqCst)).count()
    }

    /// Delay of the oldest live timer
    pub fn next_timer_delay(&self) -> Option<Duration> {
        self.queue
            .lock()
            .timers
            .iter()
            .find(|t| !t.cancelled.load(Ordering::SeqCst))
            .map(|t| t.delay)
    }

    /// Every delay ever requested, in order
    pub fn delays(&self) -> Vec<Duration> {
        self.queue.lock().delays.clone()
    }

    pub fn cancellations(&self) -> usize {
        self.cancellations.load(Ordering::SeqCst)
    }
}

impl Scheduler for ManualScheduler {
    fn spawn(&self, task: BoxFuture<'static, ()>) -> CancellationToken {
        let (cancelled, token) = self.token();
        self.queue.lock().tasks.push_back(QueuedTask { task, cancelled });
        token
    }

    fn schedule_after(
        &self,
        delay: Duration,
        callback: Box<dyn FnOnce() + Send + 'static>,
    ) -> CancellationToken {
        let (cancelled, token) = self.token();
        let mut queue = self.queue.lock();
        queue.delays.push(delay);
        queue.timers.push_back(QueuedTimer { delay, callback, cancelled });
        token
    }
}
