//! Capability traits for remote device subsystems
//!
//! Each trait is one remote capability. Calls are blocking round-trips on a
//! real device, so callers bound them with a timeout.

use std::path::Path;

use async_trait::async_trait;

use super::error::DeviceError;
use super::types::{DataFields, FocusTarget, MicroEvent, ObjectSnapshot};

/// Text-to-speech
#[async_trait]
pub trait Speech: Send + Sync {
    async fn say(&self, text: &str) -> Result<(), DeviceError>;
}

/// Joint control
#[async_trait]
pub trait Motion: Send + Sync {
    /// Set stiffness of a body part (0.0 limp, 1.0 rigid)
    async fn set_stiffness(&self, part: &str, value: f32) -> Result<(), DeviceError>;

    /// Move the joints of a body part to absolute angles, in radians
    async fn set_angles(&self, part: &str, angles: &[f32]) -> Result<(), DeviceError>;
}

/// Object and gesture tracker
#[async_trait]
pub trait GestureTracker: Send + Sync {
    /// Start (or restart) the tracker on a camera
    async fn start_tracker(&self, fps: u32, camera_id: i32) -> Result<(), DeviceError>;

    /// Stop the tracker without deleting object kinds
    async fn stop_tracker(&self) -> Result<(), DeviceError>;

    async fn add_gesture(&self, name: &str, keypoints: &[i32]) -> Result<(), DeviceError>;

    async fn remove_gesture(&self, name: &str) -> Result<(), DeviceError>;

    /// Follow an object with head movements; false if the target is unknown
    async fn focus_object(&self, target: FocusTarget) -> Result<bool, DeviceError>;

    async fn stop_focus(&self) -> Result<(), DeviceError>;

    /// Load a dataset as a new object kind, returning the number of images
    async fn load_dataset(&self, path: &Path) -> Result<usize, DeviceError>;

    /// Raise micro-event `name` for object `slot`; false if refused
    async fn track_object(&self, name: &str, slot: i32) -> Result<bool, DeviceError>;

    async fn remove_object_kind(&self, slot: i32) -> Result<(), DeviceError>;

    async fn object_list(&self, fields: DataFields) -> Result<Vec<ObjectSnapshot>, DeviceError>;

    /// Data for each requested slot, `None` where the object is untracked
    async fn object_data(&self, slots: &[i32], fields: DataFields) -> Result<Vec<Option<ObjectSnapshot>>, DeviceError>;
}

/// Micro-event subscription management
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Deliver events raised under `key` to `method` of module `handler`
    async fn subscribe(&self, key: &str, handler: &str, method: &str) -> Result<(), DeviceError>;

    async fn unsubscribe(&self, key: &str) -> Result<(), DeviceError>;
}

/// A module that receives micro-events
///
/// Called from the event bus's own delivery task, never from the caller
/// that subscribed.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, method: &str, event: MicroEvent);
}
