//! Values exchanged with device capabilities

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Highest valid gesture direction code (directions are `code * PI/4`)
pub const MAX_DIRECTION: i32 = 7;

/// What the head follows while focus is on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FocusTarget {
    /// Whichever object the tracker sees first
    #[default]
    Any,
    /// The object kind at a tracker slot
    Slot(i32),
}

impl fmt::Display for FocusTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FocusTarget::Any => write!(f, "any"),
            FocusTarget::Slot(slot) => write!(f, "slot {}", slot),
        }
    }
}

/// Notification raised on the device event bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MicroEvent {
    /// Event key, matches the tracked kind name
    pub key: String,

    /// Variable-length value tuple
    pub value: Vec<Value>,

    /// Opaque context supplied by the raiser
    pub message: Value,
}

impl MicroEvent {
    pub fn new(key: impl Into<String>, value: Vec<Value>, message: Value) -> Self {
        Self {
            key: key.into(),
            value,
            message,
        }
    }
}

/// Object data selection for tracker queries
///
/// Bits of the device data code: 1 object id, 2 object kind,
/// 4 centroid, 8 area. Fields are always reported in that order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFields {
    pub id: bool,
    pub kind: bool,
    pub centroid: bool,
    pub area: bool,
}

impl DataFields {
    pub const ALL: DataFields = DataFields {
        id: true,
        kind: true,
        centroid: true,
        area: true,
    };

    /// Decode a device data code
    pub fn from_code(code: u8) -> Self {
        Self {
            id: code & 1 != 0,
            kind: code & 2 != 0,
            centroid: code & 4 != 0,
            area: code & 8 != 0,
        }
    }

    /// Encode as a device data code
    pub fn code(&self) -> u8 {
        (self.id as u8) | (self.kind as u8) << 1 | (self.centroid as u8) << 2 | (self.area as u8) << 3
    }
}

/// One tracked object as reported by the tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    /// Capture time of the frame the data came from
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub centroid: Option<(f32, f32)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<f32>,
}

/// Check a gesture keypoint sequence
///
/// Returns a description of the first problem found.
pub fn validate_keypoints(keypoints: &[i32]) -> Result<(), String> {
    if keypoints.is_empty() {
        return Err("gesture has no keypoints".to_string());
    }
    if let Some(bad) = keypoints.iter().find(|k| !(0..=MAX_DIRECTION).contains(*k)) {
        return Err(format!("keypoint {} outside 0..={}", bad, MAX_DIRECTION));
    }
    Ok(())
}
