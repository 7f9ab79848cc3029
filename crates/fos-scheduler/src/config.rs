//! Scheduler Configuration

use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

/// Default frame budget (ms) a flush may run before yielding
pub const DEFAULT_FRAME_INTERVAL_MS: f64 = 5.0;

/// Highest frame rate accepted by `force_frame_rate`
pub const DEFAULT_MAX_FRAME_RATE: f64 = 125.0;

/// Scheduler configuration options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Time slice (ms) after which `should_yield` reports true
    pub frame_interval_ms: f64,

    /// Upper bound for `force_frame_rate` (fps)
    pub max_frame_rate: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
            max_frame_rate: DEFAULT_MAX_FRAME_RATE,
        }
    }
}

impl SchedulerConfig {
    /// Create with a custom frame budget
    pub fn with_frame_interval(frame_interval_ms: f64) -> Self {
        Self {
            frame_interval_ms,
            ..Default::default()
        }
    }

    /// Check that all values are usable
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if !self.frame_interval_ms.is_finite() || self.frame_interval_ms <= 0.0 {
            return Err(SchedulerError::InvalidConfig(format!(
                "frame_interval_ms must be positive, got {}",
                self.frame_interval_ms
            )));
        }
        if !self.max_frame_rate.is_finite() || self.max_frame_rate <= 0.0 {
            return Err(SchedulerError::InvalidConfig(format!(
                "max_frame_rate must be positive, got {}",
                self.max_frame_rate
            )));
        }
        Ok(())
    }
}
