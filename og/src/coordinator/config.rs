//! Coordinator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::device::FocusTarget;

/// Gesture registered when the coordinator starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GestureSpec {
    pub name: String,
    pub keypoints: Vec<i32>,
}

impl GestureSpec {
    pub fn new(name: impl Into<String>, keypoints: &[i32]) -> Self {
        Self {
            name: name.into(),
            keypoints: keypoints.to_vec(),
        }
    }
}

/// Coordinator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Module name the coordinator registers its event handler under
    #[serde(default = "default_name")]
    pub name: String,

    /// Handler method named in event subscriptions
    #[serde(rename = "event-method", default = "default_event_method")]
    pub event_method: String,

    /// Tracker frame rate
    #[serde(rename = "tracker-fps", default = "default_tracker_fps")]
    pub tracker_fps: u32,

    /// Camera used at startup (0 top, 1 bottom)
    #[serde(rename = "default-camera", default = "default_camera")]
    pub default_camera: i32,

    /// Object the head follows once tracking starts
    #[serde(rename = "focus-target", default = "default_focus_target")]
    pub focus_target: FocusTarget,

    /// Body part stiffened at startup
    #[serde(rename = "stiffness-part", default = "default_stiffness_part")]
    pub stiffness_part: String,

    #[serde(default = "default_stiffness")]
    pub stiffness: f32,

    /// Upper bound on any single remote call
    #[serde(rename = "call-timeout-ms", default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Decoded detections buffered per local subscriber
    #[serde(rename = "detection-buffer", default = "default_detection_buffer")]
    pub detection_buffer: usize,

    /// Gestures registered at startup and removed on unload
    #[serde(default = "default_gestures")]
    pub gestures: Vec<GestureSpec>,
}

fn default_name() -> String {
    debug!("default_name: called");
    "ObjectTracker".to_string()
}

fn default_event_method() -> String {
    debug!("default_event_method: called");
    "onObjGet".to_string()
}

fn default_tracker_fps() -> u32 {
    debug!("default_tracker_fps: called");
    15
}

fn default_camera() -> i32 {
    debug!("default_camera: called");
    0
}

fn default_focus_target() -> FocusTarget {
    debug!("default_focus_target: called");
    FocusTarget::Any
}

fn default_stiffness_part() -> String {
    debug!("default_stiffness_part: called");
    "Head".to_string()
}

fn default_stiffness() -> f32 {
    debug!("default_stiffness: called");
    1.0
}

fn default_call_timeout_ms() -> u64 {
    debug!("default_call_timeout_ms: called");
    5000
}

fn default_detection_buffer() -> usize {
    debug!("default_detection_buffer: called");
    256
}

fn default_gestures() -> Vec<GestureSpec> {
    debug!("default_gestures: called");
    vec![
        GestureSpec::new("Drink", &[2, 6]),
        GestureSpec::new("FrogL", &[1, 0, 7]),
        GestureSpec::new("FrogR", &[3, 4, 5]),
    ]
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        debug!("CoordinatorConfig::default: called");
        Self {
            name: default_name(),
            event_method: default_event_method(),
            tracker_fps: default_tracker_fps(),
            default_camera: default_camera(),
            focus_target: default_focus_target(),
            stiffness_part: default_stiffness_part(),
            stiffness: default_stiffness(),
            call_timeout_ms: default_call_timeout_ms(),
            detection_buffer: default_detection_buffer(),
            gestures: default_gestures(),
        }
    }
}

impl CoordinatorConfig {
    /// Get the remote call timeout as a Duration
    pub fn call_timeout(&self) -> Duration {
        debug!(call_timeout_ms = %self.call_timeout_ms, "CoordinatorConfig::call_timeout: called");
        Duration::from_millis(self.call_timeout_ms)
    }
}
