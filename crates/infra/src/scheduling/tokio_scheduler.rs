//! [`Scheduler`] on a tokio runtime

use std::time::Duration;

use futures::future::BoxFuture;
use rebound_core::{CancellationToken, Scheduler};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::trace;

use super::error::SchedulerError;

/// Runs attempts as tokio tasks and backoff timers as sleeping tasks.
///
/// Holds a runtime [`Handle`], so it can be used from threads that are not
/// themselves inside the runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Scheduler spawning onto the runtime behind `handle`
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Scheduler for the runtime the caller is running in
    pub fn current() -> Result<Self, SchedulerError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|err| SchedulerError::NoRuntime(err.to_string()))
    }
}

fn abort_on_cancel(join: JoinHandle<()>) -> CancellationToken {
    CancellationToken::new(move || join.abort())
}

impl Scheduler for TokioScheduler {
    fn spawn(&self, task: BoxFuture<'static, ()>) -> CancellationToken {
        abort_on_cancel(self.handle.spawn(task))
    }

    fn schedule_after(
        &self,
        delay: Duration,
        callback: Box<dyn FnOnce() + Send + 'static>,
    ) -> CancellationToken {
        trace!(delay_ms = delay.as_millis() as u64, "arming retry timer");
        abort_on_cancel(self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn current_fails_outside_runtime() {
        assert!(matches!(TokioScheduler::current(), Err(SchedulerError::NoRuntime(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn timer_fires_after_delay() {
        let scheduler = TokioScheduler::current().expect("runtime");
        let fired = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&fired);
        let _token = scheduler.schedule_after(
            Duration::from_secs(5),
            Box::new(move || flag.store(true, Ordering::SeqCst)),
        );

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(!fired.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let scheduler = TokioScheduler::current().expect("runtime");
        let fired = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&fired);
        let token = scheduler.schedule_after(
            Duration::from_millis(50),
            Box::new(move || flag.store(true, Ordering::SeqCst)),
        );
        token.cancel();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn spawned_task_runs() {
        let scheduler = TokioScheduler::current().expect("runtime");
        let (tx, rx) = tokio::sync::oneshot::channel();

        let _token = scheduler.spawn(Box::pin(async move {
            let _ = tx.send(42);
        }));

        assert_eq!(rx.await.expect("task ran"), 42);
    }
}
