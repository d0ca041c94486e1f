//! Event handler module registered with the broker

use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::payload::Detection;
use super::registry::TrackedKindRegistry;
use crate::device::{EventHandler, MicroEvent};

/// A detection attributed to a tracked kind
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KindDetection {
    pub kind: String,
    pub index: usize,
    pub detection: Detection,
    pub message: Value,
}

/// Receives micro-events for tracked kinds on the bus's delivery task
pub struct KindEventHandler {
    method: String,
    kinds: Arc<RwLock<TrackedKindRegistry>>,
    detections: broadcast::Sender<KindDetection>,
}

impl KindEventHandler {
    pub fn new(
        method: impl Into<String>,
        kinds: Arc<RwLock<TrackedKindRegistry>>,
        detections: broadcast::Sender<KindDetection>,
    ) -> Self {
        Self {
            method: method.into(),
            kinds,
            detections,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn subscribe(&self) -> broadcast::Receiver<KindDetection> {
        self.detections.subscribe()
    }

    /// Decode and publish one event; None for unknown keys or bad payloads
    pub fn handle(&self, key: &str, value: &[Value], message: &Value) -> Option<KindDetection> {
        debug!(%key, ?value, "KindEventHandler::handle: called");
        let index = {
            let kinds = self.kinds.read().unwrap_or_else(PoisonError::into_inner);
            kinds.position(key)
        };
        let Some(index) = index else {
            debug!(%key, "Dropping event for untracked key");
            return None;
        };

        let detection = match Detection::decode(value) {
            Ok(detection) => detection,
            Err(e) => {
                debug!(%key, error = %e, "Dropping malformed payload");
                return None;
            }
        };

        match &detection {
            Detection::Lost => info!(kind = %key, "Object lost"),
            Detection::Brief { .. } => {
                info!(kind = %key, label = ?detection.label_text(), "Object detected")
            }
            Detection::Full {
                object_id, centroid, ..
            } => info!(kind = %key, ?object_id, ?centroid, label = ?detection.label_text(), "Object detected"),
        }

        let found = KindDetection {
            kind: key.to_string(),
            index,
            detection,
            message: message.clone(),
        };
        // No local subscribers is fine
        let _ = self.detections.send(found.clone());
        Some(found)
    }
}

impl EventHandler for KindEventHandler {
    fn on_event(&self, method: &str, event: MicroEvent) {
        if method != self.method {
            debug!(%method, expected = %self.method, "Ignoring call to unknown handler method");
            return;
        }
        self.handle(&event.key, &event.value, &event.message);
    }
}
