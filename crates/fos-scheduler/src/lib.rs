//! fOS Scheduler
//!
//! Cooperative, priority-aware task scheduling for a single-threaded host
//! event loop.
//!
//! Tasks are ordered by deadline (start time plus a per-priority timeout).
//! Each flush episode runs tasks until a frame budget (5 ms by default) is
//! spent and then yields back to the host. Long callbacks poll
//! [`Scheduler::should_yield`] and return a continuation to pause.
//!
//! # Example
//! ```rust
//! use std::rc::Rc;
//! use fos_scheduler::{EventLoop, ManualClock, PriorityLevel, Scheduler, TaskStatus};
//!
//! let event_loop = Rc::new(EventLoop::with_clock(ManualClock::new()));
//! let scheduler = Scheduler::new(event_loop.clone());
//!
//! scheduler.schedule_callback(PriorityLevel::Normal, |_did_timeout| {
//!     Ok(TaskStatus::Complete)
//! });
//! event_loop.run_until_idle().unwrap();
//! assert!(!scheduler.has_pending_work());
//! ```

mod config;
mod error;
pub mod heap;
pub mod host;
mod priority;
mod scheduler;
mod task;

pub use config::{DEFAULT_FRAME_INTERVAL_MS, DEFAULT_MAX_FRAME_RATE, SchedulerConfig};
pub use error::SchedulerError;
pub use heap::{HeapNode, MinHeap};
pub use host::{Clock, EventLoop, EventLoopStats, Host, HostCallback, ManualClock, TimerCallback, WallClock};
pub use priority::{
    IDLE_PRIORITY_TIMEOUT, IMMEDIATE_PRIORITY_TIMEOUT, LOW_PRIORITY_TIMEOUT,
    NORMAL_PRIORITY_TIMEOUT, PriorityLevel, USER_BLOCKING_PRIORITY_TIMEOUT,
};
pub use scheduler::{ScheduleOptions, Scheduler, SchedulerStats};
pub use task::{Callback, TaskHandle, TaskResult, TaskStatus};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
