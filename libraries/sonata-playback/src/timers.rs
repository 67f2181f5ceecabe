//! Cancellable one-shot timers
//!
//! Hibernation and the completion watchdog arm timers through
//! [`TimerScheduler`]. A timer task never touches engine state itself; it only
//! posts a signal to the control thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tokio::task::AbortHandle;

/// Work run when a timer fires
pub type TimerTask = Box<dyn FnOnce() + Send>;

/// Source of one-shot timers
pub trait TimerScheduler: Send + Sync {
    /// Run `task` once after `delay` unless the handle is cancelled first
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle;
}

/// Handle to a scheduled timer
///
/// Cancelling is unconditional and idempotent: it is safe whether or not the
/// timer already fired. Dropping the handle cancels the timer.
#[derive(Debug)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
    abort: Option<AbortHandle>,
}

impl TimerHandle {
    fn new(cancelled: Arc<AtomicBool>, abort: Option<AbortHandle>) -> Self {
        Self { cancelled, abort }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Wall-clock timers on a small dedicated tokio runtime
pub struct TokioTimers {
    runtime: Runtime,
}

impl TokioTimers {
    pub fn new() -> std::io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("sonata-timers")
            .enable_time()
            .build()?;
        Ok(Self { runtime })
    }
}

impl TimerScheduler for TokioTimers {
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        let join = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if !flag.load(Ordering::SeqCst) {
                task();
            }
        });

        TimerHandle::new(cancelled, Some(join.abort_handle()))
    }
}

struct ManualEntry {
    due: Duration,
    seq: u64,
    cancelled: Arc<AtomicBool>,
    task: TimerTask,
}

#[derive(Default)]
struct ManualClock {
    now: Duration,
    next_seq: u64,
    entries: Vec<ManualEntry>,
}

/// Virtual-clock timers; time only moves through [`ManualTimers::advance`]
///
/// Due tasks run on the caller's thread, in due order (ties in scheduling
/// order). Clones share one clock.
#[derive(Clone, Default)]
pub struct ManualTimers {
    clock: Arc<Mutex<ManualClock>>,
}

impl ManualTimers {
    pub fn new() -> Self {
        Self::default()
    }

    fn clock(&self) -> MutexGuard<'_, ManualClock> {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn now(&self) -> Duration {
        self.clock().now
    }

    /// Timers armed and not cancelled
    pub fn pending(&self) -> usize {
        self.clock()
            .entries
            .iter()
            .filter(|e| !e.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Move the clock forward, firing every task that falls due
    pub fn advance(&self, by: Duration) {
        let target = self.now() + by;
        loop {
            let next = {
                let mut clock = self.clock();
                clock.entries.retain(|e| !e.cancelled.load(Ordering::SeqCst));
                let index = clock
                    .entries
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| e.due <= target)
                    .min_by_key(|(_, e)| (e.due, e.seq))
                    .map(|(i, _)| i);
                index.map(|i| {
                    let entry = clock.entries.swap_remove(i);
                    clock.now = clock.now.max(entry.due);
                    entry
                })
            };

            // Lock released: tasks may schedule new timers
            match next {
                Some(entry) => (entry.task)(),
                None => break,
            }
        }
        let mut clock = self.clock();
        clock.now = clock.now.max(target);
    }
}

impl TimerScheduler for ManualTimers {
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut clock = self.clock();
        let seq = clock.next_seq;
        clock.next_seq += 1;
        let due = clock.now + delay;
        clock.entries.push(ManualEntry {
            due,
            seq,
            cancelled: Arc::clone(&cancelled),
            task,
        });
        TimerHandle::new(cancelled, None)
    }
}
