//! Host Interface
//!
//! The scheduler never owns a thread or a clock. It asks its host for the
//! current time, for a callback after the current synchronous turn, and for
//! a single delayed timer.

mod clock;
mod event_loop;

pub use clock::*;
pub use event_loop::*;

use crate::error::SchedulerError;

/// Deferred flush posted by the scheduler. Its error surfaces to whoever
/// dispatches it.
pub type HostCallback = Box<dyn FnOnce() -> Result<(), SchedulerError>>;

/// Timer callback posted by the scheduler
pub type TimerCallback = Box<dyn FnOnce()>;

/// Embedding environment contract
///
/// The scheduler keeps at most one deferred callback outstanding and at most
/// one armed timer, and always calls `cancel_timer` before re-arming.
pub trait Host {
    /// Monotonic time in milliseconds since an arbitrary fixed epoch
    fn now(&self) -> f64;

    /// Run `callback` after the current synchronous execution unwinds
    fn defer_to_next_turn(&self, callback: HostCallback);

    /// Run `callback` once `delay_ms` have elapsed
    fn arm_timer(&self, callback: TimerCallback, delay_ms: f64);

    /// Drop the armed timer, if any
    fn cancel_timer(&self);
}
