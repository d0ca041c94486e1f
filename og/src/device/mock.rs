//! Recording capability double for unit tests

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::broker::{Broker, ModuleRegistry};
use super::error::DeviceError;
use super::traits::{EventBus, GestureTracker, Motion, Speech};
use super::types::{DataFields, FocusTarget, ObjectSnapshot};

/// Implements every capability, records each call, and fails or hangs
/// operations on request
#[derive(Default)]
pub struct MockDevice {
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<&'static str>>,
    hanging: Mutex<HashSet<&'static str>>,
    refuse_tracking: AtomicBool,
}

impl MockDevice {
    pub fn new() -> Arc<Self> {
        debug!("MockDevice::new: called");
        Arc::new(Self::default())
    }

    /// Make every call to `operation` fail with a rejection
    pub fn fail(&self, operation: &'static str) {
        self.failing.lock().unwrap_or_else(PoisonError::into_inner).insert(operation);
    }

    /// Make every call to `operation` hang forever
    pub fn hang(&self, operation: &'static str) {
        self.hanging.lock().unwrap_or_else(PoisonError::into_inner).insert(operation);
    }

    /// Make `track_object` answer false
    pub fn refuse_tracking(&self) {
        self.refuse_tracking.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.split('(').next() == Some(operation))
            .count()
    }

    /// Broker exposing this double as every capability
    pub fn broker(self: &Arc<Self>, modules: Arc<ModuleRegistry>) -> Broker {
        Broker::new("mock", modules)
            .with_speech(self.clone())
            .with_motion(self.clone())
            .with_tracker(self.clone())
            .with_bus(self.clone())
    }

    async fn enter(&self, operation: &'static str, call: String) -> Result<(), DeviceError> {
        debug!(%call, "MockDevice::enter: called");
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(call);
        let hangs = self.hanging.lock().unwrap_or_else(PoisonError::into_inner).contains(operation);
        if hangs {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        let fails = self.failing.lock().unwrap_or_else(PoisonError::into_inner).contains(operation);
        if fails {
            return Err(DeviceError::rejected(format!("{} failed", operation)));
        }
        Ok(())
    }
}

#[async_trait]
impl Speech for MockDevice {
    async fn say(&self, text: &str) -> Result<(), DeviceError> {
        self.enter("say", format!("say({})", text)).await
    }
}

#[async_trait]
impl Motion for MockDevice {
    async fn set_stiffness(&self, part: &str, value: f32) -> Result<(), DeviceError> {
        self.enter("set_stiffness", format!("set_stiffness({}, {})", part, value)).await
    }

    async fn set_angles(&self, part: &str, angles: &[f32]) -> Result<(), DeviceError> {
        self.enter("set_angles", format!("set_angles({}, {:?})", part, angles)).await
    }
}

#[async_trait]
impl GestureTracker for MockDevice {
    async fn start_tracker(&self, fps: u32, camera_id: i32) -> Result<(), DeviceError> {
        self.enter("start_tracker", format!("start_tracker({}, {})", fps, camera_id))
            .await
    }

    async fn stop_tracker(&self) -> Result<(), DeviceError> {
        self.enter("stop_tracker", "stop_tracker()".to_string()).await
    }

    async fn add_gesture(&self, name: &str, keypoints: &[i32]) -> Result<(), DeviceError> {
        self.enter("add_gesture", format!("add_gesture({}, {:?})", name, keypoints))
            .await
    }

    async fn remove_gesture(&self, name: &str) -> Result<(), DeviceError> {
        self.enter("remove_gesture", format!("remove_gesture({})", name)).await
    }

    async fn focus_object(&self, target: FocusTarget) -> Result<bool, DeviceError> {
        self.enter("focus_object", format!("focus_object({})", target)).await?;
        Ok(true)
    }

    async fn stop_focus(&self) -> Result<(), DeviceError> {
        self.enter("stop_focus", "stop_focus()".to_string()).await
    }

    async fn load_dataset(&self, path: &Path) -> Result<usize, DeviceError> {
        self.enter("load_dataset", format!("load_dataset({})", path.display()))
            .await
            .map_err(|_| DeviceError::dataset(path, "unreadable"))?;
        Ok(3)
    }

    async fn track_object(&self, name: &str, slot: i32) -> Result<bool, DeviceError> {
        self.enter("track_object", format!("track_object({}, {})", name, slot))
            .await?;
        Ok(!self.refuse_tracking.load(Ordering::SeqCst))
    }

    async fn remove_object_kind(&self, slot: i32) -> Result<(), DeviceError> {
        self.enter("remove_object_kind", format!("remove_object_kind({})", slot))
            .await
    }

    async fn object_list(&self, fields: DataFields) -> Result<Vec<ObjectSnapshot>, DeviceError> {
        self.enter("object_list", format!("object_list({})", fields.code())).await?;
        Ok(Vec::new())
    }

    /// Every slot reads as untracked
    async fn object_data(
        &self,
        slots: &[i32],
        fields: DataFields,
    ) -> Result<Vec<Option<ObjectSnapshot>>, DeviceError> {
        self.enter("object_data", format!("object_data({:?}, {})", slots, fields.code()))
            .await?;
        Ok(vec![None; slots.len()])
    }
}

#[async_trait]
impl EventBus for MockDevice {
    async fn subscribe(&self, key: &str, handler: &str, method: &str) -> Result<(), DeviceError> {
        self.enter("subscribe", format!("subscribe({}, {}, {})", key, handler, method))
            .await
    }

    async fn unsubscribe(&self, key: &str) -> Result<(), DeviceError> {
        self.enter("unsubscribe", format!("unsubscribe({})", key)).await
    }
}
