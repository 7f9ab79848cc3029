//! Priority Levels
//!
//! Maps each priority level to the relative timeout that becomes a task's
//! deadline. Execution order follows deadlines, not levels.

use serde::{Deserialize, Serialize};

/// Timeout for [`PriorityLevel::Immediate`]; already expired on creation
pub const IMMEDIATE_PRIORITY_TIMEOUT: f64 = -1.0;
/// Timeout for [`PriorityLevel::UserBlocking`]
pub const USER_BLOCKING_PRIORITY_TIMEOUT: f64 = 250.0;
/// Timeout for [`PriorityLevel::Normal`]
pub const NORMAL_PRIORITY_TIMEOUT: f64 = 5000.0;
/// Timeout for [`PriorityLevel::Low`]
pub const LOW_PRIORITY_TIMEOUT: f64 = 10000.0;
/// Timeout for [`PriorityLevel::Idle`]: max 31-bit signed integer, never expires
pub const IDLE_PRIORITY_TIMEOUT: f64 = 1_073_741_823.0;

/// Task priority levels, most urgent first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum PriorityLevel {
    /// Must run now (input handling, sync flushes)
    Immediate = 1,
    /// Must run soon (animation, user feedback)
    UserBlocking = 2,
    /// Default priority
    Normal = 3,
    /// Background work (prefetch, analytics)
    Low = 4,
    /// Only when nothing else is pending
    Idle = 5,
}

impl Default for PriorityLevel {
    fn default() -> Self {
        Self::Normal
    }
}

impl PriorityLevel {
    /// All levels, most urgent first
    pub fn all() -> &'static [PriorityLevel] {
        &[
            PriorityLevel::Immediate,
            PriorityLevel::UserBlocking,
            PriorityLevel::Normal,
            PriorityLevel::Low,
            PriorityLevel::Idle,
        ]
    }

    /// Relative timeout (ms) added to a task's start time to get its deadline
    pub fn timeout_ms(self) -> f64 {
        match self {
            Self::Immediate => IMMEDIATE_PRIORITY_TIMEOUT,
            Self::UserBlocking => USER_BLOCKING_PRIORITY_TIMEOUT,
            Self::Normal => NORMAL_PRIORITY_TIMEOUT,
            Self::Low => LOW_PRIORITY_TIMEOUT,
            Self::Idle => IDLE_PRIORITY_TIMEOUT,
        }
    }

    /// Get priority name
    pub fn name(self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::UserBlocking => "user-blocking",
            Self::Normal => "normal",
            Self::Low => "low",
            Self::Idle => "idle",
        }
    }
}

impl std::fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts() {
        assert_eq!(PriorityLevel::Immediate.timeout_ms(), -1.0);
        assert_eq!(PriorityLevel::UserBlocking.timeout_ms(), 250.0);
        assert_eq!(PriorityLevel::Normal.timeout_ms(), 5000.0);
        assert_eq!(PriorityLevel::Low.timeout_ms(), 10000.0);
        assert_eq!(PriorityLevel::Idle.timeout_ms(), ((1u32 << 30) - 1) as f64);
    }

    #[test]
    fn test_timeouts_increase_with_level() {
        let timeouts: Vec<f64> = PriorityLevel::all().iter().map(|p| p.timeout_ms()).collect();
        assert!(timeouts.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_default_and_names() {
        assert_eq!(PriorityLevel::default(), PriorityLevel::Normal);
        assert_eq!(PriorityLevel::UserBlocking.to_string(), "user-blocking");
    }
}
