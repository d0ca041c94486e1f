//! Device capabilities
//!
//! The robot exposes four remote capabilities: speech, motion, the
//! object/gesture tracker and the micro-event bus. Each is a trait so the
//! coordinator can run against a real device, the in-process
//! [`LocalDevice`], or a test double. A [`Broker`] carries the handles.

mod broker;
mod bus;
mod config;
pub mod dataset;
mod error;
mod local;
#[cfg(test)]
pub mod mock;
mod traits;
mod types;

pub use broker::{Broker, ModuleRegistry};
pub use bus::{DEFAULT_QUEUE_CAPACITY, EventDispatcher, LocalEventBus};
pub use config::LocalDeviceConfig;
pub use error::DeviceError;
pub use local::{BODY_PARTS, FRAME_HEIGHT, FRAME_WIDTH, LocalDevice, LocalMotion, LocalSpeech, LocalTracker};
pub use traits::{EventBus, EventHandler, GestureTracker, Motion, Speech};
pub use types::{DataFields, FocusTarget, MAX_DIRECTION, MicroEvent, ObjectSnapshot, validate_keypoints};
