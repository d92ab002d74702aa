//! Single-assignment result cell.
//!
//! A [`SettleCell`] starts empty and is settled at most once. The first call
//! to [`SettleCell::settle`] wins an atomic compare-and-set; every later call
//! is a no-op that reports `false`. Observers can register continuations,
//! poll the cell from a future, or block a thread until a value lands.
//!
//! Continuations run on the thread that settles the cell (or on the
//! registering thread if the cell is already settled), never while the cell's
//! internal lock is held, so they may freely call back into the cell.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

type Continuation<T> = Box<dyn FnOnce(&T) + Send>;

struct CellState<T> {
    value: Option<Arc<T>>,
    continuations: Vec<Continuation<T>>,
    wakers: Vec<Waker>,
}

/// A write-once cell with continuations, async polling and blocking waits.
pub struct SettleCell<T> {
    claimed: AtomicBool,
    state: Mutex<CellState<T>>,
    ready: Condvar,
}

impl<T> SettleCell<T> {
    pub fn new() -> Self {
        Self {
            claimed: AtomicBool::new(false),
            state: Mutex::new(CellState {
                value: None,
                continuations: Vec::new(),
                wakers: Vec::new(),
            }),
            ready: Condvar::new(),
        }
    }

    /// Settle the cell with `value`.
    ///
    /// Returns `true` if this call won; `false` if the cell was already
    /// claimed, in which case `value` is dropped.
    pub fn settle(&self, value: T) -> bool {
        if self.claimed.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err()
        {
            return false;
        }

        let value = Arc::new(value);
        let (continuations, wakers) = {
            let mut state = self.state.lock();
            state.value = Some(Arc::clone(&value));
            (std::mem::take(&mut state.continuations), std::mem::take(&mut state.wakers))
        };

        self.ready.notify_all();
        for waker in wakers {
            waker.wake();
        }
        for continuation in continuations {
            continuation(&value);
        }
        true
    }

    /// Whether some caller has claimed the cell.
    ///
    /// May briefly be `true` before [`get`](Self::get) returns the value.
    pub fn is_settled(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    /// The settled value, if it has been stored
    pub fn get(&self) -> Option<Arc<T>> {
        self.state.lock().value.clone()
    }

    /// Run `continuation` with the value once the cell settles.
    ///
    /// Runs immediately on the calling thread when the cell already holds a value.
    pub fn on_settled<F>(&self, continuation: F)
    where
        F: FnOnce(&T) + Send + 'static,
    {
        let mut state = self.state.lock();
        match state.value.clone() {
            Some(value) => {
                drop(state);
                continuation(&value);
            }
            None => state.continuations.push(Box::new(continuation)),
        }
    }

    /// Poll for the value, registering `cx`'s waker while empty.
    pub fn poll_settled(&self, cx: &mut Context<'_>) -> Poll<Arc<T>> {
        let mut state = self.state.lock();
        if let Some(value) = &state.value {
            return Poll::Ready(Arc::clone(value));
        }
        if !state.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            state.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }

    /// Block the current thread until the cell settles.
    ///
    /// Never call this from inside an async task.
    pub fn wait(&self) -> Arc<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(value) = &state.value {
                return Arc::clone(value);
            }
            self.ready.wait(&mut state);
        }
    }

    /// Block for at most `timeout`; `None` if the cell is still empty.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Arc<T>> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return Some(self.wait());
        };
        let mut state = self.state.lock();
        loop {
            if let Some(value) = &state.value {
                return Some(Arc::clone(value));
            }
            if self.ready.wait_until(&mut state, deadline).timed_out() {
                return state.value.clone();
            }
        }
    }
}

impl<T> Default for SettleCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for SettleCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SettleCell")
            .field("claimed", &self.is_settled())
            .field("value", &state.value)
            .field("pending_continuations", &state.continuations.len())
            .finish()
    }
}
