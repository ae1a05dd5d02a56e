use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

/// Where a [`LoadTest`](crate::LoadTest) is in its life.
///
/// `Idle -> Running -> (Draining) -> Finalized`. Draining means no new request will be
/// dispatched and in-flight requests are finishing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Lifecycle {
    Idle = 0,
    Running = 1,
    Draining = 2,
    Finalized = 3,
}

impl Lifecycle {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Lifecycle::Idle,
            1 => Lifecycle::Running,
            2 => Lifecycle::Draining,
            _ => Lifecycle::Finalized,
        }
    }
}

/// Live request counters of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Progress {
    /// Requests that obtained a permit and were handed to the executor.
    pub dispatched: u64,
    pub completed: u64,
    pub failed: u64,
}

impl Progress {
    pub fn in_flight(&self) -> u64 {
        self.dispatched
            .saturating_sub(self.completed + self.failed)
    }
}

/// State shared between the orchestrator, its workers and any [`StopHandle`].
#[derive(Debug)]
pub(crate) struct RunState {
    budget: Option<u64>,
    lifecycle: AtomicU8,
    cancel: CancellationToken,
    claimed: AtomicU64,
    dispatched: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl RunState {
    /// `budget` is the total number of request slots, `None` for an open-ended run.
    pub fn new(budget: Option<u64>) -> Self {
        Self {
            budget,
            lifecycle: AtomicU8::new(Lifecycle::Idle as u8),
            cancel: CancellationToken::new(),
            claimed: AtomicU64::new(0),
            dispatched: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Claim the next request slot. Every index below the budget is handed out exactly once;
    /// `None` once the budget is spent or the run was cancelled.
    pub fn claim(&self) -> Option<u64> {
        if self.cancel.is_cancelled() {
            return None;
        }

        self.claimed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |claimed| {
                match self.budget {
                    Some(budget) if claimed >= budget => None,
                    _ => Some(claimed + 1),
                }
            })
            .ok()
    }

    pub fn record_dispatch(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outcome(&self, completed: bool) {
        let counter = if completed {
            &self.completed
        } else {
            &self.failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn progress(&self) -> Progress {
        Progress {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_u8(self.lifecycle.load(Ordering::Acquire))
    }

    pub fn transition(&self, from: Lifecycle, to: Lifecycle) -> bool {
        self.lifecycle
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn finalize(&self) {
        self.lifecycle
            .store(Lifecycle::Finalized as u8, Ordering::Release);
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Stop dispatching. Only acts on a running (or already draining) run.
    pub fn stop(&self) -> bool {
        let stopping = self.transition(Lifecycle::Running, Lifecycle::Draining)
            || self.lifecycle() == Lifecycle::Draining;
        if stopping {
            self.cancel.cancel();
        }
        stopping
    }
}

/// Cloneable handle that stops a run from any task or thread.
///
/// Stopping is idempotent. Requests already in flight finish; nothing new is dispatched.
/// Stopping a run that has not started, or has finished, does nothing.
#[derive(Clone, Debug)]
pub struct StopHandle {
    pub(crate) state: Arc<RunState>,
}

impl StopHandle {
    pub fn stop(&self) {
        if self.state.stop() {
            debug!("Stop requested.");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.state.cancel_token().is_cancelled()
    }
}
