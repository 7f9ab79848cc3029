//! Task Scheduler
//!
//! Cooperative, deadline-ordered scheduling on a single-threaded host.
//!
//! Ready tasks sit in a min-heap keyed by deadline; delayed tasks sit in a
//! second min-heap keyed by start time until they become eligible. Each
//! flush runs ready tasks until the frame budget is spent, then hands the
//! thread back to the host and asks for another flush. Overdue tasks are
//! never deferred for budget reasons.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::heap::MinHeap;
use crate::host::Host;
use crate::priority::PriorityLevel;
use crate::task::{Callback, Task, TaskHandle, TaskResult, TaskStatus};

/// Per-call scheduling options
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScheduleOptions {
    /// Delay (ms) before the task becomes eligible. Ignored unless positive.
    pub delay: Option<f64>,
}

impl ScheduleOptions {
    /// Options with a delay
    pub fn delay(delay_ms: f64) -> Self {
        Self { delay: Some(delay_ms) }
    }
}

/// Scheduler statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub total_scheduled: u64,
    /// Callbacks that returned without a continuation
    pub total_completed: u64,
    pub total_cancelled: u64,
    /// Callbacks that returned an error
    pub total_failed: u64,
    pub continuations: u64,
    /// Flush episodes started
    pub flushes: u64,
    /// Tasks in the ready queue (cancelled ones included until popped)
    pub pending_ready: usize,
    /// Tasks in the delayed queue (cancelled ones included until promoted)
    pub pending_delayed: usize,
}

struct State {
    /// Ready tasks keyed by expiration time
    task_queue: MinHeap<Rc<Task>>,
    /// Delayed tasks keyed by start time
    timer_queue: MinHeap<Rc<Task>>,
    next_task_id: u64,

    current_task: Option<Rc<Task>>,
    current_priority: PriorityLevel,

    /// A flush was requested and has not started yet
    is_host_callback_scheduled: bool,
    /// The host timer is armed
    is_host_timeout_scheduled: bool,
    /// Inside `flush_work`
    is_performing_work: bool,
    /// A deferred flush is posted or running
    is_message_loop_running: bool,
    is_paused: bool,
    needs_paint: bool,

    /// Start of the current flush episode
    episode_start: f64,
    frame_interval: f64,

    stats: SchedulerStats,
}

struct Inner {
    host: Rc<dyn Host>,
    config: SchedulerConfig,
    state: RefCell<State>,
}

/// Cooperative task scheduler
///
/// Cloning is cheap and yields another handle to the same scheduler, which
/// is how task callbacks schedule follow-up work.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<Inner>,
}

impl Scheduler {
    /// Create a scheduler with the default configuration
    pub fn new(host: Rc<dyn Host>) -> Self {
        Self::build(host, SchedulerConfig::default())
    }

    /// Create a scheduler with a validated configuration
    pub fn with_config(host: Rc<dyn Host>, config: SchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate()?;
        Ok(Self::build(host, config))
    }

    fn build(host: Rc<dyn Host>, config: SchedulerConfig) -> Self {
        let state = State {
            task_queue: MinHeap::new(),
            timer_queue: MinHeap::new(),
            next_task_id: 1,
            current_task: None,
            current_priority: PriorityLevel::Normal,
            is_host_callback_scheduled: false,
            is_host_timeout_scheduled: false,
            is_performing_work: false,
            is_message_loop_running: false,
            is_paused: false,
            needs_paint: false,
            episode_start: -1.0,
            frame_interval: config.frame_interval_ms,
            stats: SchedulerStats::default(),
        };
        Self {
            inner: Rc::new(Inner {
                host,
                config,
                state: RefCell::new(state),
            }),
        }
    }

    fn state(&self) -> Ref<'_, State> {
        self.inner.state.borrow()
    }

    fn state_mut(&self) -> RefMut<'_, State> {
        self.inner.state.borrow_mut()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Current host time (ms)
    pub fn now(&self) -> f64 {
        self.inner.host.now()
    }

    /// Schedule a callback with no delay
    pub fn schedule_callback<F>(&self, priority: PriorityLevel, callback: F) -> TaskHandle
    where
        F: FnOnce(bool) -> TaskResult + 'static,
    {
        self.schedule_callback_with_options(priority, callback, ScheduleOptions::default())
    }

    /// Schedule a callback
    ///
    /// A positive delay parks the task in the delayed queue until its start
    /// time; otherwise it is ready at once.
    pub fn schedule_callback_with_options<F>(
        &self,
        priority: PriorityLevel,
        callback: F,
        options: ScheduleOptions,
    ) -> TaskHandle
    where
        F: FnOnce(bool) -> TaskResult + 'static,
    {
        let current_time = self.now();
        let start_time = match options.delay {
            Some(delay) if delay > 0.0 => current_time + delay,
            _ => current_time,
        };
        let expiration_time = start_time + priority.timeout_ms();
        let delayed = start_time > current_time;

        let (task, arm_timer, request_flush) = {
            let mut state = self.state_mut();
            let id = state.next_task_id;
            state.next_task_id += 1;
            state.stats.total_scheduled += 1;

            let sort_index = if delayed { start_time } else { expiration_time };
            let task = Rc::new(Task::new(
                id,
                priority,
                Callback::new(callback),
                start_time,
                expiration_time,
                sort_index,
            ));

            if delayed {
                state.timer_queue.push(task.clone());
                let earliest = state.task_queue.is_empty()
                    && state.timer_queue.peek().is_some_and(|head| Rc::ptr_eq(head, &task));
                (task, earliest, false)
            } else {
                state.task_queue.push(task.clone());
                let request = !state.is_host_callback_scheduled && !state.is_performing_work;
                (task, false, request)
            }
        };

        tracing::debug!(
            "Scheduled task {} ({}) start={:.3} expires={:.3}",
            task.id,
            priority,
            start_time,
            expiration_time
        );

        if arm_timer {
            self.request_host_timeout(start_time - current_time);
        }
        if request_flush {
            self.request_host_callback();
        }

        TaskHandle::new(task)
    }

    /// Cancel a task
    ///
    /// The callback is dropped right away; the task itself leaves its queue
    /// the next time it surfaces.
    pub fn cancel_callback(&self, handle: &TaskHandle) {
        if handle.task.take_callback().is_some() {
            self.state_mut().stats.total_cancelled += 1;
            tracing::debug!("Cancelled task {}", handle.task.id);
        }
    }

    /// Whether a running callback should return a continuation and yield
    pub fn should_yield(&self) -> bool {
        let state = self.state();
        if state.needs_paint {
            return true;
        }
        let elapsed = self.inner.host.now() - state.episode_start;
        elapsed >= state.frame_interval
    }

    /// Ask the scheduler to yield so the host can paint
    ///
    /// `should_yield` reports true until the next flush episode starts.
    pub fn request_paint(&self) {
        self.state_mut().needs_paint = true;
    }

    /// Override the frame budget from a target frame rate
    ///
    /// `0` restores the configured budget.
    pub fn force_frame_rate(&self, fps: f64) -> Result<(), SchedulerError> {
        let max = self.inner.config.max_frame_rate;
        if !(0.0..=max).contains(&fps) {
            tracing::error!("force_frame_rate takes a value between 0 and {}, got {}", max, fps);
            return Err(SchedulerError::InvalidFrameRate { fps, max });
        }

        let frame_interval = if fps > 0.0 {
            (1000.0 / fps).floor()
        } else {
            self.inner.config.frame_interval_ms
        };
        self.state_mut().frame_interval = frame_interval;
        tracing::debug!("Frame interval set to {}ms", frame_interval);
        Ok(())
    }

    /// Priority of the running task, or of the enclosing priority scope
    pub fn current_priority_level(&self) -> PriorityLevel {
        self.state().current_priority
    }

    /// Run `f` with `priority` as the current priority
    pub fn run_with_priority<R>(&self, priority: PriorityLevel, f: impl FnOnce() -> R) -> R {
        let _scope = PriorityScope::enter(self, priority);
        f()
    }

    /// Run `f` one step below urgent priorities
    ///
    /// Immediate, UserBlocking and Normal all run `f` at Normal. Lower
    /// priorities are kept as they are.
    pub fn next<R>(&self, f: impl FnOnce() -> R) -> R {
        let priority = match self.current_priority_level() {
            PriorityLevel::Immediate | PriorityLevel::UserBlocking | PriorityLevel::Normal => {
                PriorityLevel::Normal
            }
            other => other,
        };
        self.run_with_priority(priority, f)
    }

    /// Bind `f` to the current priority so it can run later under it
    pub fn wrap_callback<F, R>(&self, f: F) -> Box<dyn FnOnce() -> R>
    where
        F: FnOnce() -> R + 'static,
        R: 'static,
    {
        let parent_priority = self.current_priority_level();
        let scheduler = self.clone();
        Box::new(move || scheduler.run_with_priority(parent_priority, f))
    }

    /// Head of the ready queue
    pub fn first_callback_node(&self) -> Option<TaskHandle> {
        self.state().task_queue.peek().cloned().map(TaskHandle::new)
    }

    /// Stop running tasks until `continue_execution`
    pub fn pause_execution(&self) {
        self.state_mut().is_paused = true;
        tracing::debug!("Scheduler paused");
    }

    pub fn continue_execution(&self) {
        let request = {
            let mut state = self.state_mut();
            state.is_paused = false;
            !state.task_queue.is_empty()
                && !state.is_host_callback_scheduled
                && !state.is_performing_work
        };
        tracing::debug!("Scheduler resumed");
        if request {
            self.request_host_callback();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.state().is_paused
    }

    /// Whether either queue still holds a task
    pub fn has_pending_work(&self) -> bool {
        let state = self.state();
        !state.task_queue.is_empty() || !state.timer_queue.is_empty()
    }

    pub fn stats(&self) -> SchedulerStats {
        let state = self.state();
        SchedulerStats {
            pending_ready: state.task_queue.len(),
            pending_delayed: state.timer_queue.len(),
            ..state.stats
        }
    }

    /// Move delayed tasks whose start time has come into the ready queue
    fn advance_timers(&self, current_time: f64) {
        let mut state = self.state_mut();
        loop {
            let (cancelled, start_time) = match state.timer_queue.peek() {
                Some(timer) => (!timer.has_callback(), timer.start_time),
                None => return,
            };

            if cancelled {
                state.timer_queue.pop();
            } else if start_time <= current_time {
                if let Some(timer) = state.timer_queue.pop() {
                    timer.set_sort_index(timer.expiration_time);
                    tracing::trace!("Promoted task {} to ready queue", timer.id);
                    state.task_queue.push(timer);
                }
            } else {
                return;
            }
        }
    }

    /// Timer handler: promote due tasks, then flush or wait for the next one
    fn handle_timeout(&self) {
        self.state_mut().is_host_timeout_scheduled = false;
        let current_time = self.now();
        self.advance_timers(current_time);

        let (flush_scheduled, has_ready, first_timer) = {
            let state = self.state();
            (
                state.is_host_callback_scheduled,
                !state.task_queue.is_empty(),
                state.timer_queue.peek().map(|t| t.start_time),
            )
        };
        if flush_scheduled {
            return;
        }
        if has_ready {
            self.request_host_callback();
        } else if let Some(start_time) = first_timer {
            self.request_host_timeout(start_time - current_time);
        }
    }

    /// Mark a flush as wanted and post one unless one is already outstanding
    fn request_host_callback(&self) {
        let post = {
            let mut state = self.state_mut();
            state.is_host_callback_scheduled = true;
            let post = !state.is_message_loop_running;
            state.is_message_loop_running = true;
            post
        };
        if post {
            self.post_flush();
        }
    }

    fn post_flush(&self) {
        tracing::debug!("Requesting flush");
        let weak: Weak<Inner> = Rc::downgrade(&self.inner);
        self.inner.host.defer_to_next_turn(Box::new(move || match weak.upgrade() {
            Some(inner) => Scheduler { inner }.perform_work_until_deadline(),
            None => Ok(()),
        }));
    }

    /// Arm the host timer, replacing any armed one
    fn request_host_timeout(&self, delay_ms: f64) {
        let was_armed = {
            let mut state = self.state_mut();
            std::mem::replace(&mut state.is_host_timeout_scheduled, true)
        };
        if was_armed {
            self.inner.host.cancel_timer();
        }

        tracing::debug!("Arming timer for {:.3}ms", delay_ms);
        let weak: Weak<Inner> = Rc::downgrade(&self.inner);
        self.inner.host.arm_timer(
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    Scheduler { inner }.handle_timeout();
                }
            }),
            delay_ms,
        );
    }

    /// Deferred flush entry point
    ///
    /// Re-posts itself while work remains, including after a failed task.
    fn perform_work_until_deadline(&self) -> Result<(), SchedulerError> {
        let current_time = self.now();
        {
            let mut state = self.state_mut();
            if !state.is_message_loop_running {
                return Ok(());
            }
            state.episode_start = current_time;
            state.needs_paint = false;
        }

        let mut rearm = RearmGuard {
            scheduler: self,
            has_more_work: true,
        };
        let result = self.flush_work(current_time);
        if let Ok(has_more_work) = &result {
            rearm.has_more_work = *has_more_work;
        }
        drop(rearm);
        result.map(|_| ())
    }

    fn flush_work(&self, initial_time: f64) -> Result<bool, SchedulerError> {
        let cancel_timer = {
            let mut state = self.state_mut();
            state.stats.flushes += 1;
            state.is_host_callback_scheduled = false;
            std::mem::replace(&mut state.is_host_timeout_scheduled, false)
        };
        if cancel_timer {
            // The work loop promotes delayed tasks itself
            self.inner.host.cancel_timer();
        }

        let _work = WorkGuard::enter(self);
        self.work_loop(initial_time)
    }

    fn work_loop(&self, initial_time: f64) -> Result<bool, SchedulerError> {
        let mut current_time = initial_time;
        self.advance_timers(current_time);

        loop {
            let task = {
                let mut state = self.state_mut();
                if state.is_paused {
                    break;
                }
                let Some(task) = state.task_queue.peek().cloned() else {
                    break;
                };
                state.current_task = Some(task.clone());
                task
            };

            if task.expiration_time > current_time && self.should_yield() {
                break;
            }

            let Some(callback) = task.take_callback() else {
                self.state_mut().task_queue.pop();
                continue;
            };

            self.state_mut().current_priority = task.priority;
            let did_timeout = task.expiration_time <= current_time;
            tracing::trace!("Running task {} (did_timeout={})", task.id, did_timeout);

            let result = callback.invoke(did_timeout);
            current_time = self.now();

            match result {
                Ok(TaskStatus::Continue(continuation)) => {
                    task.set_callback(continuation);
                    self.state_mut().stats.continuations += 1;
                    self.advance_timers(current_time);
                    return Ok(true);
                }
                Ok(TaskStatus::Complete) => {
                    {
                        let mut state = self.state_mut();
                        state.stats.total_completed += 1;
                        pop_if_head(&mut state.task_queue, &task);
                    }
                    self.advance_timers(current_time);
                }
                Err(source) => {
                    {
                        let mut state = self.state_mut();
                        state.stats.total_failed += 1;
                        pop_if_head(&mut state.task_queue, &task);
                    }
                    tracing::error!("Task {} failed: {:#}", task.id, source);
                    return Err(SchedulerError::TaskFailed { id: task.id, source });
                }
            }
        }

        let (paused, has_ready, first_timer) = {
            let state = self.state();
            (
                state.is_paused,
                !state.task_queue.is_empty(),
                state.timer_queue.peek().map(|t| t.start_time),
            )
        };
        if has_ready {
            // While paused, `continue_execution` posts the next flush
            return Ok(!paused);
        }
        if let Some(start_time) = first_timer {
            self.request_host_timeout(start_time - current_time);
        }
        Ok(false)
    }
}

/// Pop `task` unless a callback displaced it from the head
fn pop_if_head(queue: &mut MinHeap<Rc<Task>>, task: &Rc<Task>) {
    if queue.peek().is_some_and(|head| Rc::ptr_eq(head, task)) {
        queue.pop();
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Scheduler")
            .field("pending_ready", &state.task_queue.len())
            .field("pending_delayed", &state.timer_queue.len())
            .field("current_task", &state.current_task.as_ref().map(|t| t.id))
            .field("current_priority", &state.current_priority)
            .field("is_performing_work", &state.is_performing_work)
            .field("is_paused", &state.is_paused)
            .finish()
    }
}

/// Restores the previous priority when a scope ends
struct PriorityScope<'a> {
    scheduler: &'a Scheduler,
    previous: PriorityLevel,
}

impl<'a> PriorityScope<'a> {
    fn enter(scheduler: &'a Scheduler, priority: PriorityLevel) -> Self {
        let previous = std::mem::replace(&mut scheduler.state_mut().current_priority, priority);
        Self { scheduler, previous }
    }
}

impl Drop for PriorityScope<'_> {
    fn drop(&mut self) {
        self.scheduler.state_mut().current_priority = self.previous;
    }
}

/// Holds the performing-work state for one flush; released on every exit
struct WorkGuard<'a> {
    scheduler: &'a Scheduler,
    previous_priority: PriorityLevel,
}

impl<'a> WorkGuard<'a> {
    fn enter(scheduler: &'a Scheduler) -> Self {
        let mut state = scheduler.state_mut();
        state.is_performing_work = true;
        Self {
            scheduler,
            previous_priority: state.current_priority,
        }
    }
}

impl Drop for WorkGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.scheduler.state_mut();
        state.current_task = None;
        state.current_priority = self.previous_priority;
        state.is_performing_work = false;
    }
}

/// Re-posts the flush if work remains, otherwise lets the loop go idle
struct RearmGuard<'a> {
    scheduler: &'a Scheduler,
    has_more_work: bool,
}

impl Drop for RearmGuard<'_> {
    fn drop(&mut self) {
        if self.has_more_work {
            self.scheduler.post_flush();
        } else {
            self.scheduler.state_mut().is_message_loop_running = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Clock, EventLoop, ManualClock};

    fn setup() -> (ManualClock, Rc<EventLoop<ManualClock>>, Scheduler) {
        let clock = ManualClock::new();
        let event_loop = Rc::new(EventLoop::with_clock(clock.clone()));
        let scheduler = Scheduler::new(event_loop.clone());
        (clock, event_loop, scheduler)
    }

    fn done(_: bool) -> TaskResult {
        Ok(TaskStatus::Complete)
    }

    fn flush(event_loop: &EventLoop<ManualClock>) -> Result<(), SchedulerError> {
        event_loop.run_next_task().expect("no flush posted")
    }

    #[test]
    fn test_ready_task_posts_one_flush() {
        let (_, event_loop, scheduler) = setup();
        scheduler.schedule_callback(PriorityLevel::Normal, done);
        scheduler.schedule_callback(PriorityLevel::Normal, done);
        assert_eq!(event_loop.pending_task_count(), 1);

        flush(&event_loop).unwrap();
        assert!(!event_loop.has_pending_task());
        assert_eq!(scheduler.stats().total_completed, 2);
    }

    #[test]
    fn test_delayed_task_arms_timer() {
        let (_, event_loop, scheduler) = setup();
        let handle = scheduler.schedule_callback_with_options(
            PriorityLevel::Normal,
            done,
            ScheduleOptions::delay(100.0),
        );
        assert_eq!(handle.start_time(), 100.0);
        assert_eq!(handle.expiration_time(), 5100.0);
        assert!(!event_loop.has_pending_task());
        assert_eq!(event_loop.next_timer_due(), Some(100.0));
    }

    #[test]
    fn test_earlier_delay_rearms_timer() {
        let (_, event_loop, scheduler) = setup();
        scheduler.schedule_callback_with_options(PriorityLevel::Normal, done, ScheduleOptions::delay(100.0));
        scheduler.schedule_callback_with_options(PriorityLevel::Normal, done, ScheduleOptions::delay(300.0));
        assert_eq!(event_loop.next_timer_due(), Some(100.0));

        scheduler.schedule_callback_with_options(PriorityLevel::Normal, done, ScheduleOptions::delay(50.0));
        assert_eq!(event_loop.next_timer_due(), Some(50.0));
        assert_eq!(event_loop.stats().timers_cancelled, 1);
    }

    #[test]
    fn test_non_positive_delay_is_ready() {
        let (_, event_loop, scheduler) = setup();
        let handle = scheduler.schedule_callback_with_options(
            PriorityLevel::UserBlocking,
            done,
            ScheduleOptions::delay(-10.0),
        );
        assert_eq!(handle.start_time(), 0.0);
        assert_eq!(handle.expiration_time(), 250.0);
        assert!(event_loop.has_pending_task());
        assert!(!event_loop.has_pending_timer());
    }

    #[test]
    fn test_should_yield_budget() {
        let (clock, event_loop, scheduler) = setup();
        let observed = Rc::new(RefCell::new(Vec::new()));
        let s = scheduler.clone();
        let log = observed.clone();
        scheduler.schedule_callback(PriorityLevel::Normal, move |_| {
            log.borrow_mut().push(s.should_yield());
            clock.advance(4.0);
            log.borrow_mut().push(s.should_yield());
            clock.advance(1.0);
            log.borrow_mut().push(s.should_yield());
            Ok(TaskStatus::Complete)
        });

        flush(&event_loop).unwrap();
        assert_eq!(*observed.borrow(), vec![false, false, true]);
    }

    #[test]
    fn test_request_paint_forces_yield() {
        let (_, event_loop, scheduler) = setup();
        let observed = Rc::new(RefCell::new(Vec::new()));
        let s = scheduler.clone();
        let log = observed.clone();
        scheduler.schedule_callback(PriorityLevel::Normal, move |_| {
            log.borrow_mut().push(s.should_yield());
            s.request_paint();
            log.borrow_mut().push(s.should_yield());
            Ok(TaskStatus::Complete)
        });
        flush(&event_loop).unwrap();
        assert_eq!(*observed.borrow(), vec![false, true]);
    }

    #[test]
    fn test_force_frame_rate() {
        let (_, _, scheduler) = setup();
        assert!(scheduler.force_frame_rate(60.0).is_ok());
        assert_eq!(scheduler.state().frame_interval, 16.0);

        assert!(matches!(
            scheduler.force_frame_rate(200.0),
            Err(SchedulerError::InvalidFrameRate { .. })
        ));
        assert!(scheduler.force_frame_rate(-1.0).is_err());
        assert_eq!(scheduler.state().frame_interval, 16.0);

        scheduler.force_frame_rate(0.0).unwrap();
        assert_eq!(scheduler.state().frame_interval, 5.0);
    }

    #[test]
    fn test_with_config_validates() {
        let event_loop = Rc::new(EventLoop::with_clock(ManualClock::new()));
        assert!(Scheduler::with_config(event_loop.clone(), SchedulerConfig::with_frame_interval(0.0)).is_err());

        let scheduler = Scheduler::with_config(event_loop, SchedulerConfig::with_frame_interval(10.0)).unwrap();
        assert_eq!(scheduler.config().frame_interval_ms, 10.0);
    }

    #[test]
    fn test_current_priority_during_task() {
        let (_, event_loop, scheduler) = setup();
        let seen = Rc::new(RefCell::new(Vec::new()));
        for priority in [PriorityLevel::Low, PriorityLevel::UserBlocking] {
            let s = scheduler.clone();
            let seen = seen.clone();
            scheduler.schedule_callback(priority, move |_| {
                seen.borrow_mut().push(s.current_priority_level());
                Ok(TaskStatus::Complete)
            });
        }

        flush(&event_loop).unwrap();
        // UserBlocking has the earlier deadline
        assert_eq!(*seen.borrow(), vec![PriorityLevel::UserBlocking, PriorityLevel::Low]);
        assert_eq!(scheduler.current_priority_level(), PriorityLevel::Normal);
    }

    #[test]
    fn test_run_with_priority_and_next() {
        let (_, _, scheduler) = setup();
        let inner = scheduler.run_with_priority(PriorityLevel::UserBlocking, || {
            let here = scheduler.current_priority_level();
            let next = scheduler.next(|| scheduler.current_priority_level());
            (here, next)
        });
        assert_eq!(inner, (PriorityLevel::UserBlocking, PriorityLevel::Normal));

        let idle_next = scheduler.run_with_priority(PriorityLevel::Idle, || {
            scheduler.next(|| scheduler.current_priority_level())
        });
        assert_eq!(idle_next, PriorityLevel::Idle);
        assert_eq!(scheduler.current_priority_level(), PriorityLevel::Normal);
    }

    #[test]
    fn test_wrap_callback_keeps_priority() {
        let (_, _, scheduler) = setup();
        let s = scheduler.clone();
        let wrapped = scheduler.run_with_priority(PriorityLevel::Low, || {
            scheduler.wrap_callback(move || s.current_priority_level())
        });
        assert_eq!(scheduler.current_priority_level(), PriorityLevel::Normal);
        assert_eq!(wrapped(), PriorityLevel::Low);
        assert_eq!(scheduler.current_priority_level(), PriorityLevel::Normal);
    }

    #[test]
    fn test_first_callback_node() {
        let (_, _, scheduler) = setup();
        assert!(scheduler.first_callback_node().is_none());
        let low = scheduler.schedule_callback(PriorityLevel::Low, done);
        assert_eq!(scheduler.first_callback_node(), Some(low.clone()));
        let urgent = scheduler.schedule_callback(PriorityLevel::Immediate, done);
        assert_eq!(scheduler.first_callback_node(), Some(urgent));
        assert_ne!(scheduler.first_callback_node(), Some(low));
    }

    #[test]
    fn test_pause_and_continue() {
        let (_, event_loop, scheduler) = setup();
        let ran = Rc::new(RefCell::new(0));
        let count = ran.clone();
        scheduler.pause_execution();
        scheduler.schedule_callback(PriorityLevel::Normal, move |_| {
            *count.borrow_mut() += 1;
            Ok(TaskStatus::Complete)
        });

        flush(&event_loop).unwrap();
        assert_eq!(*ran.borrow(), 0);
        assert!(!event_loop.has_pending_task());
        assert!(scheduler.has_pending_work());

        scheduler.continue_execution();
        assert!(!scheduler.is_paused());
        flush(&event_loop).unwrap();
        assert_eq!(*ran.borrow(), 1);
        assert!(!scheduler.has_pending_work());
    }

    #[test]
    fn test_pause_keeps_delayed_timer() {
        let (clock, event_loop, scheduler) = setup();
        let s = scheduler.clone();
        scheduler.schedule_callback(PriorityLevel::Normal, move |_| {
            s.pause_execution();
            Ok(TaskStatus::Complete)
        });
        let delayed = scheduler.schedule_callback_with_options(
            PriorityLevel::Normal,
            done,
            ScheduleOptions::delay(100.0),
        );

        flush(&event_loop).unwrap();
        assert!(scheduler.is_paused());
        assert_eq!(event_loop.next_timer_due(), Some(100.0));

        scheduler.continue_execution();
        event_loop.run_until_idle().unwrap();
        assert_eq!(clock.now_ms(), 100.0);
        assert!(!delayed.is_pending());
        assert!(!scheduler.has_pending_work());
    }

    #[test]
    fn test_stats() {
        let (_, event_loop, scheduler) = setup();
        let a = scheduler.schedule_callback(PriorityLevel::Normal, done);
        scheduler.schedule_callback(PriorityLevel::Normal, done);
        scheduler.cancel_callback(&a);
        scheduler.cancel_callback(&a);

        let stats = scheduler.stats();
        assert_eq!(stats.total_scheduled, 2);
        assert_eq!(stats.total_cancelled, 1);
        assert_eq!(stats.pending_ready, 2);

        flush(&event_loop).unwrap();
        let stats = scheduler.stats();
        assert_eq!(stats.total_completed, 1);
        assert_eq!(stats.flushes, 1);
        assert_eq!(stats.pending_ready, 0);
    }

    #[test]
    fn test_panicking_task_restores_state() {
        let (_, event_loop, scheduler) = setup();
        scheduler.schedule_callback(PriorityLevel::UserBlocking, |_| panic!("task panicked"));
        scheduler.schedule_callback(PriorityLevel::Normal, done);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| flush(&event_loop)));
        assert!(result.is_err());
        assert_eq!(scheduler.current_priority_level(), PriorityLevel::Normal);
        assert!(!scheduler.state().is_performing_work);
        assert!(scheduler.state().current_task.is_none());

        // Unwinding re-posted the flush; the panicked task is skipped
        assert!(event_loop.has_pending_task());
        flush(&event_loop).unwrap();
        assert_eq!(scheduler.stats().total_completed, 1);
        assert!(!scheduler.has_pending_work());
    }

    #[test]
    fn test_dropped_scheduler_ignores_flush() {
        let (_, event_loop, scheduler) = setup();
        scheduler.schedule_callback(PriorityLevel::Normal, done);
        drop(scheduler);
        assert_eq!(flush(&event_loop).ok(), Some(()));
    }
}
