//! Local device configuration

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::bus::DEFAULT_QUEUE_CAPACITY;

/// Settings for the in-process device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalDeviceConfig {
    /// Every Nth frame reports a full detection instead of a brief one
    #[serde(rename = "full-report-every", default = "default_full_report_every")]
    pub full_report_every: u64,

    /// Maximum centroid drift per frame, in pixels
    #[serde(rename = "tick-jitter", default = "default_tick_jitter")]
    pub tick_jitter: f32,

    /// Event bus delivery queue size
    #[serde(rename = "queue-capacity", default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_full_report_every() -> u64 {
    debug!("default_full_report_every: called");
    5
}

fn default_tick_jitter() -> f32 {
    debug!("default_tick_jitter: called");
    4.0
}

fn default_queue_capacity() -> usize {
    debug!("default_queue_capacity: called");
    DEFAULT_QUEUE_CAPACITY
}

impl Default for LocalDeviceConfig {
    fn default() -> Self {
        debug!("LocalDeviceConfig::default: called");
        Self {
            full_report_every: 5,
            tick_jitter: 4.0,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl LocalDeviceConfig {
    /// Drift bound actually applied per frame
    ///
    /// Non-finite values fall back to the default.
    pub fn jitter(&self) -> f32 {
        if self.tick_jitter.is_finite() {
            self.tick_jitter.abs()
        } else {
            warn!(tick_jitter = %self.tick_jitter, "Ignoring non-finite tick-jitter");
            default_tick_jitter()
        }
    }
}
