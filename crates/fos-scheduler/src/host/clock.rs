//! Clocks
//!
//! Time sources for [`EventLoop`](super::EventLoop).

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Millisecond time source
pub trait Clock {
    /// Milliseconds since the clock's origin
    fn now_ms(&self) -> f64;

    /// Block until `deadline_ms` is reached
    fn wait_until(&self, deadline_ms: f64);
}

/// Monotonic wall clock anchored at creation
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    origin: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for WallClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    fn wait_until(&self, deadline_ms: f64) {
        loop {
            let remaining = deadline_ms - self.now_ms();
            if remaining <= 0.0 {
                return;
            }
            std::thread::sleep(Duration::from_secs_f64(remaining / 1000.0));
        }
    }
}

/// Hand-driven clock for deterministic runs
///
/// Clones share the same time, so a test can keep one copy and give another
/// to the event loop.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    /// Create a clock starting at 0 ms
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock starting at `start_ms`
    pub fn starting_at(start_ms: f64) -> Self {
        Self { now: Rc::new(Cell::new(start_ms)) }
    }

    /// Move time forward
    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }

    /// Jump to an absolute time
    pub fn set(&self, ms: f64) {
        self.now.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }

    /// Nothing else can move a manual clock, so waiting jumps forward.
    fn wait_until(&self, deadline_ms: f64) {
        if deadline_ms > self.now.get() {
            self.now.set(deadline_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::new();
        let other = clock.clone();
        clock.advance(10.0);
        assert_eq!(other.now_ms(), 10.0);

        other.wait_until(25.0);
        assert_eq!(clock.now_ms(), 25.0);

        // Never moves backwards while waiting
        clock.wait_until(5.0);
        assert_eq!(clock.now_ms(), 25.0);
    }

    #[test]
    fn test_manual_clock_start_and_set() {
        let clock = ManualClock::starting_at(1000.0);
        assert_eq!(clock.now_ms(), 1000.0);

        clock.set(40.0);
        assert_eq!(clock.now_ms(), 40.0);
        clock.advance(2.5);
        assert_eq!(clock.now_ms(), 42.5);
    }

    #[test]
    fn test_wall_clock_monotonic() {
        let clock = WallClock::new();
        let a = clock.now_ms();
        clock.wait_until(a + 1.0);
        assert!(clock.now_ms() >= a + 1.0);
    }
}
