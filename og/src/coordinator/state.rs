//! Coordinator lifecycle states

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a coordinator
///
/// A coordinator value only exists once initialization succeeded, so the
/// uninitialized state is never observable. `Unloaded` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CoordinatorState {
    /// Setup done, tracker running without head focus
    Initialized,
    /// Tracking with focus-follow enabled
    Tracking,
    /// Tracker and focus stopped
    Idle,
    Unloaded,
}

impl CoordinatorState {
    pub fn is_unloaded(&self) -> bool {
        matches!(self, CoordinatorState::Unloaded)
    }
}

impl fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CoordinatorState::Initialized => "initialized",
            CoordinatorState::Tracking => "tracking",
            CoordinatorState::Idle => "idle",
            CoordinatorState::Unloaded => "unloaded",
        };
        write!(f, "{}", name)
    }
}
