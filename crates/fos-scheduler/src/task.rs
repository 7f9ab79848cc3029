//! Tasks
//!
//! A task pairs a boxed callback with its timing and ordering keys. The
//! scheduler and the caller share the same task through [`TaskHandle`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::heap::HeapNode;
use crate::priority::PriorityLevel;

/// Result returned by a task callback
pub type TaskResult = anyhow::Result<TaskStatus>;

/// Boxed task callback
///
/// Receives `did_timeout`: true when the task's deadline had already passed
/// when it started.
pub struct Callback(Box<dyn FnOnce(bool) -> TaskResult>);

impl Callback {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(bool) -> TaskResult + 'static,
    {
        Self(Box::new(f))
    }

    pub(crate) fn invoke(self, did_timeout: bool) -> TaskResult {
        (self.0)(did_timeout)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback(..)")
    }
}

/// What a callback reports when it returns
#[derive(Debug)]
pub enum TaskStatus {
    /// Work is finished
    Complete,
    /// More work remains; run this continuation in a later flush
    Continue(Callback),
}

impl TaskStatus {
    /// Continuation shorthand
    pub fn continue_with<F>(f: F) -> Self
    where
        F: FnOnce(bool) -> TaskResult + 'static,
    {
        Self::Continue(Callback::new(f))
    }
}

/// Scheduled task
#[derive(Debug)]
pub(crate) struct Task {
    pub(crate) id: u64,
    pub(crate) priority: PriorityLevel,
    pub(crate) start_time: f64,
    pub(crate) expiration_time: f64,
    sort_index: Cell<f64>,
    /// `None` once cancelled, running, or consumed
    callback: RefCell<Option<Callback>>,
}

impl Task {
    pub(crate) fn new(
        id: u64,
        priority: PriorityLevel,
        callback: Callback,
        start_time: f64,
        expiration_time: f64,
        sort_index: f64,
    ) -> Self {
        Self {
            id,
            priority,
            start_time,
            expiration_time,
            sort_index: Cell::new(sort_index),
            callback: RefCell::new(Some(callback)),
        }
    }

    pub(crate) fn set_sort_index(&self, sort_index: f64) {
        self.sort_index.set(sort_index);
    }

    pub(crate) fn has_callback(&self) -> bool {
        self.callback.borrow().is_some()
    }

    pub(crate) fn take_callback(&self) -> Option<Callback> {
        self.callback.borrow_mut().take()
    }

    pub(crate) fn set_callback(&self, callback: Callback) {
        *self.callback.borrow_mut() = Some(callback);
    }
}

impl HeapNode for Rc<Task> {
    fn sort_index(&self) -> f64 {
        self.sort_index.get()
    }

    fn id(&self) -> u64 {
        self.id
    }
}

/// Handle returned by `schedule_callback`, used to cancel the task
#[derive(Clone)]
pub struct TaskHandle {
    pub(crate) task: Rc<Task>,
}

impl TaskHandle {
    pub(crate) fn new(task: Rc<Task>) -> Self {
        Self { task }
    }

    /// Unique task ID
    pub fn id(&self) -> u64 {
        self.task.id
    }

    pub fn priority_level(&self) -> PriorityLevel {
        self.task.priority
    }

    /// Time (ms) at which the task becomes eligible to run
    pub fn start_time(&self) -> f64 {
        self.task.start_time
    }

    /// Deadline (ms)
    pub fn expiration_time(&self) -> f64 {
        self.task.expiration_time
    }

    /// True while the task still holds a callback that has not run
    ///
    /// Stays false while the callback is executing; a returned continuation
    /// makes it true again.
    pub fn is_pending(&self) -> bool {
        self.task.has_callback()
    }
}

impl PartialEq for TaskHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.task, &other.task)
    }
}

impl Eq for TaskHandle {}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.task.id)
            .field("priority", &self.task.priority)
            .field("start_time", &self.task.start_time)
            .field("expiration_time", &self.task.expiration_time)
            .field("pending", &self.task.has_callback())
            .finish()
    }
}
