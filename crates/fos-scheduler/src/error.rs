//! Scheduler errors

/// Scheduler error
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// A task callback returned an error. The task is consumed, not retried.
    #[error("task {id} failed")]
    TaskFailed {
        id: u64,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid frame rate: {fps} (expected 0..={max} fps)")]
    InvalidFrameRate { fps: f64, max: f64 },

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl SchedulerError {
    /// Id of the failed task, for `TaskFailed`
    pub fn task_id(&self) -> Option<u64> {
        match self {
            Self::TaskFailed { id, .. } => Some(*id),
            _ => None,
        }
    }
}
