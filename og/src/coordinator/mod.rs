//! Device coordinator
//!
//! Owns everything one module installs on the device: gestures, object
//! kinds and their event subscriptions. Detections for tracked kinds are
//! decoded into [`Detection`] values and fanned out to local subscribers.

mod config;
mod core;
mod error;
mod handler;
mod payload;
mod registry;
mod state;

pub use config::{CoordinatorConfig, GestureSpec};
pub use self::core::{DeviceCoordinator, UnloadReport};
pub use error::CoordinatorError;
pub use handler::{KindDetection, KindEventHandler};
pub use payload::{BRIEF_LABEL, Detection, FULL_LABEL, PayloadError};
pub use registry::{GestureTable, TrackedKindRegistry};
pub use state::CoordinatorState;
