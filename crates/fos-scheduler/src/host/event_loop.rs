//! Event Loop
//!
//! Single-threaded host with a macrotask queue and one timer slot.
//! Over a [`ManualClock`](super::ManualClock) it is fully deterministic,
//! which is how the scheduler is tested.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;

use super::{Clock, Host, HostCallback, TimerCallback, WallClock};
use crate::error::SchedulerError;

/// Armed timer
struct PendingTimer {
    callback: TimerCallback,
    due_at: f64,
}

/// Event loop counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventLoopStats {
    /// Macrotasks posted via `defer_to_next_turn`
    pub tasks_posted: u64,
    /// Macrotasks executed
    pub tasks_run: u64,
    pub timers_armed: u64,
    pub timers_cancelled: u64,
    pub timers_fired: u64,
}

/// Host event loop
pub struct EventLoop<C: Clock = WallClock> {
    clock: C,
    /// Deferred callbacks, run in posting order
    macrotasks: RefCell<VecDeque<HostCallback>>,
    /// The single armed timer
    timer: RefCell<Option<PendingTimer>>,
    stats: Cell<EventLoopStats>,
}

impl EventLoop<WallClock> {
    /// Event loop on the wall clock
    pub fn new() -> Self {
        Self::with_clock(WallClock::new())
    }
}

impl Default for EventLoop<WallClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> EventLoop<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            macrotasks: RefCell::new(VecDeque::new()),
            timer: RefCell::new(None),
            stats: Cell::new(EventLoopStats::default()),
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Run the oldest deferred callback
    ///
    /// Returns `None` when nothing is queued, otherwise the callback's result.
    pub fn run_next_task(&self) -> Option<Result<(), SchedulerError>> {
        let task = self.macrotasks.borrow_mut().pop_front()?;
        self.record(|s| s.tasks_run += 1);
        Some(task())
    }

    /// Fire the armed timer if its time has come
    pub fn fire_due_timer(&self) -> bool {
        let now = self.clock.now_ms();
        let due = matches!(&*self.timer.borrow(), Some(t) if t.due_at <= now);
        if !due {
            return false;
        }

        let Some(timer) = self.timer.borrow_mut().take() else {
            return false;
        };
        self.record(|s| s.timers_fired += 1);
        tracing::trace!("Timer fired at {:.3}ms", now);
        (timer.callback)();
        true
    }

    /// Run deferred callbacks and timers until nothing is left
    ///
    /// Waits on the clock while only a future timer remains. Stops at the
    /// first failing callback; calling again resumes with the rest.
    pub fn run_until_idle(&self) -> Result<(), SchedulerError> {
        loop {
            if let Some(result) = self.run_next_task() {
                result?;
                continue;
            }
            if self.fire_due_timer() {
                continue;
            }
            match self.next_timer_due() {
                Some(due_at) => self.clock.wait_until(due_at),
                None => return Ok(()),
            }
        }
    }

    pub fn has_pending_task(&self) -> bool {
        !self.macrotasks.borrow().is_empty()
    }

    pub fn pending_task_count(&self) -> usize {
        self.macrotasks.borrow().len()
    }

    pub fn has_pending_timer(&self) -> bool {
        self.timer.borrow().is_some()
    }

    /// Absolute time (ms) the armed timer is due
    pub fn next_timer_due(&self) -> Option<f64> {
        self.timer.borrow().as_ref().map(|t| t.due_at)
    }

    /// Check if there's pending work
    pub fn has_pending_work(&self) -> bool {
        self.has_pending_task() || self.has_pending_timer()
    }

    pub fn stats(&self) -> EventLoopStats {
        self.stats.get()
    }

    fn record(&self, update: impl FnOnce(&mut EventLoopStats)) {
        let mut stats = self.stats.get();
        update(&mut stats);
        self.stats.set(stats);
    }
}

impl<C: Clock> Host for EventLoop<C> {
    fn now(&self) -> f64 {
        self.clock.now_ms()
    }

    fn defer_to_next_turn(&self, callback: HostCallback) {
        self.macrotasks.borrow_mut().push_back(callback);
        self.record(|s| s.tasks_posted += 1);
    }

    fn arm_timer(&self, callback: TimerCallback, delay_ms: f64) {
        let due_at = self.clock.now_ms() + delay_ms.max(0.0);
        let replaced = self.timer.borrow_mut().replace(PendingTimer { callback, due_at });
        if replaced.is_some() {
            tracing::warn!("Timer re-armed without cancel; previous timer dropped");
        }
        self.record(|s| s.timers_armed += 1);
    }

    fn cancel_timer(&self) {
        if self.timer.borrow_mut().take().is_some() {
            self.record(|s| s.timers_cancelled += 1);
        }
    }
}

impl<C: Clock + fmt::Debug> fmt::Debug for EventLoop<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("clock", &self.clock)
            .field("pending_tasks", &self.pending_task_count())
            .field("next_timer_due", &self.next_timer_due())
            .field("stats", &self.stats.get())
            .finish()
    }
}
