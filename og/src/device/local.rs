//! In-process device
//!
//! Implements every capability without hardware so the coordinator can be
//! driven end to end. The tracker does no vision work: each loaded dataset
//! becomes one object that drifts around a QVGA frame while the tracker runs.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::broker::{Broker, ModuleRegistry};
use super::bus::LocalEventBus;
use super::config::LocalDeviceConfig;
use super::dataset;
use super::error::DeviceError;
use super::traits::{GestureTracker, Motion, Speech};
use super::types::{DataFields, FocusTarget, ObjectSnapshot, validate_keypoints};

/// Body parts accepted by [`LocalMotion`]
pub const BODY_PARTS: &[&str] = &["Head", "Body", "LArm", "RArm", "LLeg", "RLeg"];

/// Frame size objects move in (QVGA)
pub const FRAME_WIDTH: f32 = 320.0;
pub const FRAME_HEIGHT: f32 = 240.0;

/// Cameras: 0 top, 1 bottom
const CAMERA_COUNT: i32 = 2;

/// Camera field of view in radians (60.97 by 47.64 degrees)
const CAMERA_HFOV: f32 = 1.0641;
const CAMERA_VFOV: f32 = 0.8315;

/// Head joint limits in radians
pub const HEAD_YAW_LIMIT: f32 = 2.0857;
pub const HEAD_PITCH_MIN: f32 = -0.6720;
pub const HEAD_PITCH_MAX: f32 = 0.5149;

/// Head yaw and pitch that center a frame point in the camera
pub fn head_angles(point: (f32, f32)) -> [f32; 2] {
    let yaw = (0.5 - point.0 / FRAME_WIDTH) * CAMERA_HFOV;
    let pitch = (point.1 / FRAME_HEIGHT - 0.5) * CAMERA_VFOV;
    [
        yaw.clamp(-HEAD_YAW_LIMIT, HEAD_YAW_LIMIT),
        pitch.clamp(HEAD_PITCH_MIN, HEAD_PITCH_MAX),
    ]
}

/// Speech that records what it was asked to say
#[derive(Default)]
pub struct LocalSpeech {
    spoken: Mutex<Vec<String>>,
}

impl LocalSpeech {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Speech for LocalSpeech {
    async fn say(&self, text: &str) -> Result<(), DeviceError> {
        info!(%text, "Saying");
        self.spoken
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_string());
        Ok(())
    }
}

/// Motion that stores per-part stiffness and joint angles
#[derive(Default)]
pub struct LocalMotion {
    stiffness: Mutex<HashMap<String, f32>>,
    angles: Mutex<HashMap<String, Vec<f32>>>,
}

impl LocalMotion {
    pub fn stiffness(&self, part: &str) -> Option<f32> {
        self.stiffness
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(part)
            .copied()
    }

    /// Last angles commanded for a part
    pub fn angles(&self, part: &str) -> Option<Vec<f32>> {
        self.angles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(part)
            .cloned()
    }
}

#[async_trait]
impl Motion for LocalMotion {
    async fn set_stiffness(&self, part: &str, value: f32) -> Result<(), DeviceError> {
        debug!(%part, value, "LocalMotion::set_stiffness: called");
        if !BODY_PARTS.contains(&part) {
            return Err(DeviceError::rejected(format!("unknown body part '{}'", part)));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(DeviceError::rejected(format!("stiffness {} outside 0.0..=1.0", value)));
        }
        self.stiffness
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(part.to_string(), value);
        Ok(())
    }

    async fn set_angles(&self, part: &str, angles: &[f32]) -> Result<(), DeviceError> {
        debug!(%part, ?angles, "LocalMotion::set_angles: called");
        if !BODY_PARTS.contains(&part) {
            return Err(DeviceError::rejected(format!("unknown body part '{}'", part)));
        }
        if angles.is_empty() || angles.iter().any(|a| !a.is_finite()) {
            return Err(DeviceError::rejected(format!("invalid angles {:?}", angles)));
        }
        if part == "Head" {
            let [yaw, pitch] = angles else {
                return Err(DeviceError::rejected("head takes yaw and pitch"));
            };
            if yaw.abs() > HEAD_YAW_LIMIT || !(HEAD_PITCH_MIN..=HEAD_PITCH_MAX).contains(pitch) {
                return Err(DeviceError::rejected(format!("head angles {:?} outside joint limits", angles)));
            }
        }
        self.angles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(part.to_string(), angles.to_vec());
        Ok(())
    }
}

/// Object kind learned from a dataset
#[derive(Debug, Clone)]
struct ObjectKind {
    root: PathBuf,
    /// False once the object left the view for good
    present: bool,
    centroid: (f32, f32),
    area: f32,
}

/// Micro-event the tracker raises for one object
#[derive(Debug, Clone)]
struct TrackedEvent {
    name: String,
    slot: i32,
}

#[derive(Debug, Default)]
struct TrackerState {
    gestures: BTreeMap<String, Vec<i32>>,
    kinds: Vec<ObjectKind>,
    events: Vec<TrackedEvent>,
    focus: Option<FocusTarget>,
    camera: Option<i32>,
    frame: u64,
}

impl TrackerState {
    fn kind_index(&self, slot: i32) -> Option<usize> {
        if slot > 0 {
            return None;
        }
        let index = slot.unsigned_abs() as usize;
        (index < self.kinds.len()).then_some(index)
    }

    fn object_present(&self, slot: i32) -> bool {
        self.kind_index(slot).is_some_and(|index| self.kinds[index].present)
    }

    fn snapshot(&self, slot: i32, fields: DataFields, timestamp: DateTime<Utc>) -> Option<ObjectSnapshot> {
        let index = self.kind_index(slot).filter(|index| self.kinds[*index].present)?;
        let kind = &self.kinds[index];
        Some(ObjectSnapshot {
            timestamp,
            id: fields.id.then_some(slot),
            kind: fields.kind.then_some(index),
            centroid: fields.centroid.then_some(kind.centroid),
            area: fields.area.then_some(kind.area),
        })
    }

    /// Centroid the head should follow this frame
    ///
    /// A focused slot whose object is gone drops the focus.
    fn focus_point(&mut self) -> Option<(f32, f32)> {
        match self.focus? {
            FocusTarget::Any => self.kinds.iter().find(|kind| kind.present).map(|kind| kind.centroid),
            FocusTarget::Slot(slot) => match self.kind_index(slot).filter(|index| self.kinds[*index].present) {
                Some(index) => Some(self.kinds[index].centroid),
                None => {
                    info!(slot, "Focused object gone, dropping focus");
                    self.focus = None;
                    None
                }
            },
        }
    }
}

/// Outcome of one tracker frame
struct Frame {
    delivered: usize,
    head: Option<[f32; 2]>,
}

struct TrackerWorker {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Tracker with a ticking detection loop
///
/// While focus is on, every frame points the head at the followed object
/// through the motion capability.
pub struct LocalTracker {
    state: Arc<Mutex<TrackerState>>,
    bus: Arc<LocalEventBus>,
    motion: Arc<dyn Motion>,
    config: LocalDeviceConfig,
    worker: Mutex<Option<TrackerWorker>>,
}

impl LocalTracker {
    pub fn new(bus: Arc<LocalEventBus>, motion: Arc<dyn Motion>, config: LocalDeviceConfig) -> Self {
        debug!(?config, "LocalTracker::new: called");
        Self {
            state: Arc::new(Mutex::new(TrackerState::default())),
            bus,
            motion,
            config,
            worker: Mutex::new(None),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    pub fn camera(&self) -> Option<i32> {
        self.state().camera
    }

    pub fn focus(&self) -> Option<FocusTarget> {
        self.state().focus
    }

    pub fn gesture(&self, name: &str) -> Option<Vec<i32>> {
        self.state().gestures.get(name).cloned()
    }

    pub fn gesture_count(&self) -> usize {
        self.state().gestures.len()
    }

    pub fn kind_count(&self) -> usize {
        self.state().kinds.len()
    }

    /// Dataset root of the kind at `slot`
    pub fn kind_source(&self, slot: i32) -> Option<PathBuf> {
        let state = self.state();
        state.kind_index(slot).map(|index| state.kinds[index].root.clone())
    }

    /// Names of the micro-events currently raised, in tracking order
    pub fn tracked_events(&self) -> Vec<String> {
        self.state().events.iter().map(|event| event.name.clone()).collect()
    }

    /// Mark the object at `slot` as gone from view
    ///
    /// The next frame notifies its subscriber with an empty value and stops
    /// raising the event.
    pub fn lose_object(&self, slot: i32) -> bool {
        let mut state = self.state();
        match state.kind_index(slot) {
            Some(index) => {
                info!(slot, "Object left the view");
                state.kinds[index].present = false;
                true
            }
            None => false,
        }
    }

    /// Advance one frame, raise micro-events for every tracked object and
    /// move the head toward the focused one
    pub async fn tick(&self) -> usize {
        let frame = tick(&self.state, &self.bus, &self.config);
        follow_focus(self.motion.as_ref(), frame.head).await;
        frame.delivered
    }

    async fn halt_worker(&self) {
        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(worker) = worker {
            debug!("LocalTracker::halt_worker: stopping tracker loop");
            let _ = worker.shutdown_tx.send(()).await;
            if let Err(e) = worker.handle.await {
                warn!("Tracker loop ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for LocalTracker {
    fn drop(&mut self) {
        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(worker) = worker {
            worker.handle.abort();
        }
    }
}

#[async_trait]
impl GestureTracker for LocalTracker {
    async fn start_tracker(&self, fps: u32, camera_id: i32) -> Result<(), DeviceError> {
        debug!(fps, camera_id, "LocalTracker::start_tracker: called");
        if fps == 0 {
            return Err(DeviceError::rejected("fps must be positive"));
        }
        if !(0..CAMERA_COUNT).contains(&camera_id) {
            return Err(DeviceError::rejected(format!("no camera with index {}", camera_id)));
        }

        self.halt_worker().await;
        self.state().camera = Some(camera_id);

        let period = Duration::from_millis((1000 / fps as u64).max(1));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let handle = tokio::spawn(run_tracker(
            self.state.clone(),
            self.bus.clone(),
            self.motion.clone(),
            self.config.clone(),
            period,
            shutdown_rx,
        ));
        *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(TrackerWorker { shutdown_tx, handle });

        info!(fps, camera_id, "Tracker started");
        Ok(())
    }

    async fn stop_tracker(&self) -> Result<(), DeviceError> {
        debug!("LocalTracker::stop_tracker: called");
        self.halt_worker().await;
        Ok(())
    }

    async fn add_gesture(&self, name: &str, keypoints: &[i32]) -> Result<(), DeviceError> {
        debug!(%name, ?keypoints, "LocalTracker::add_gesture: called");
        if name.is_empty() {
            return Err(DeviceError::rejected("gesture name is empty"));
        }
        validate_keypoints(keypoints).map_err(DeviceError::Rejected)?;
        self.state().gestures.insert(name.to_string(), keypoints.to_vec());
        Ok(())
    }

    async fn remove_gesture(&self, name: &str) -> Result<(), DeviceError> {
        debug!(%name, "LocalTracker::remove_gesture: called");
        match self.state().gestures.remove(name) {
            Some(_) => Ok(()),
            None => Err(DeviceError::rejected(format!("no gesture named '{}'", name))),
        }
    }

    async fn focus_object(&self, target: FocusTarget) -> Result<bool, DeviceError> {
        debug!(%target, "LocalTracker::focus_object: called");
        let mut state = self.state();
        if state.focus == Some(target) {
            debug!("LocalTracker::focus_object: already focused");
            return Ok(true);
        }
        if let FocusTarget::Slot(slot) = target {
            if !state.object_present(slot) {
                warn!(slot, "Attempted to focus on nonexistent object");
                return Ok(false);
            }
        }
        state.focus = Some(target);
        Ok(true)
    }

    async fn stop_focus(&self) -> Result<(), DeviceError> {
        debug!("LocalTracker::stop_focus: called");
        self.state().focus = None;
        Ok(())
    }

    async fn load_dataset(&self, path: &Path) -> Result<usize, DeviceError> {
        debug!(path = %path.display(), "LocalTracker::load_dataset: called");
        let root = path.to_path_buf();
        let scan = tokio::task::spawn_blocking(move || dataset::scan(&root))
            .await
            .map_err(|e| DeviceError::rejected(format!("dataset scan aborted: {}", e)))??;

        let images = scan.len();
        let centroid = {
            let mut rng = rand::rng();
            (
                rng.random_range(0.0..FRAME_WIDTH),
                rng.random_range(0.0..FRAME_HEIGHT),
            )
        };
        self.state().kinds.push(ObjectKind {
            root: scan.root,
            present: true,
            centroid,
            area: 400.0 + images as f32,
        });

        info!(path = %path.display(), images, "Loaded dataset");
        Ok(images)
    }

    async fn track_object(&self, name: &str, slot: i32) -> Result<bool, DeviceError> {
        debug!(%name, slot, "LocalTracker::track_object: called");
        let mut state = self.state();
        if let Some(existing) = state.events.iter().find(|event| event.name == name) {
            if existing.slot == slot {
                debug!("LocalTracker::track_object: identical event already exists");
                return Ok(true);
            }
            warn!(%name, "Duplicate tracking event name, event not created");
            return Ok(false);
        }
        if !state.object_present(slot) {
            warn!(%name, slot, "Attempted to track nonexistent object");
            return Ok(false);
        }

        state.events.push(TrackedEvent {
            name: name.to_string(),
            slot,
        });
        info!(%name, slot, "Now tracking object");
        Ok(true)
    }

    async fn remove_object_kind(&self, slot: i32) -> Result<(), DeviceError> {
        debug!(slot, "LocalTracker::remove_object_kind: called");
        let mut state = self.state();
        let index = state
            .kind_index(slot)
            .ok_or_else(|| DeviceError::rejected(format!("no object kind at slot {}", slot)))?;

        state.kinds.remove(index);
        // Kinds after `index` move up one position, so their slots grow by one.
        state.events.retain(|event| event.slot != slot);
        for event in state.events.iter_mut().filter(|event| event.slot < slot) {
            event.slot += 1;
        }
        state.focus = match state.focus {
            Some(FocusTarget::Slot(focus)) if focus == slot => None,
            Some(FocusTarget::Slot(focus)) if focus < slot => Some(FocusTarget::Slot(focus + 1)),
            other => other,
        };
        Ok(())
    }

    async fn object_list(&self, fields: DataFields) -> Result<Vec<ObjectSnapshot>, DeviceError> {
        debug!(code = fields.code(), "LocalTracker::object_list: called");
        let timestamp = Utc::now();
        let state = self.state();
        let objects = (0..state.kinds.len())
            .filter_map(|index| state.snapshot(-(index as i32), fields, timestamp))
            .collect();
        Ok(objects)
    }

    async fn object_data(
        &self,
        slots: &[i32],
        fields: DataFields,
    ) -> Result<Vec<Option<ObjectSnapshot>>, DeviceError> {
        debug!(?slots, code = fields.code(), "LocalTracker::object_data: called");
        let timestamp = Utc::now();
        let state = self.state();
        Ok(slots.iter().map(|slot| state.snapshot(*slot, fields, timestamp)).collect())
    }
}

async fn run_tracker(
    state: Arc<Mutex<TrackerState>>,
    bus: Arc<LocalEventBus>,
    motion: Arc<dyn Motion>,
    config: LocalDeviceConfig,
    period: Duration,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    info!(?period, "Tracker loop started");
    let mut ticker = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let frame = tick(&state, &bus, &config);
                follow_focus(motion.as_ref(), frame.head).await;
            }
            _ = shutdown_rx.recv() => {
                debug!("run_tracker: shutdown signal received");
                break;
            }
        }
    }

    info!("Tracker loop stopped");
}

fn tick(state: &Mutex<TrackerState>, bus: &LocalEventBus, config: &LocalDeviceConfig) -> Frame {
    let mut raised = Vec::new();
    let (lost, head) = {
        let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
        state.frame += 1;
        let frame = state.frame;
        let camera = state.camera;

        let mut rng = rand::rng();
        let jitter = config.jitter();
        for kind in state.kinds.iter_mut().filter(|kind| kind.present) {
            kind.centroid.0 = (kind.centroid.0 + rng.random_range(-jitter..=jitter)).clamp(0.0, FRAME_WIDTH);
            kind.centroid.1 = (kind.centroid.1 + rng.random_range(-jitter..=jitter)).clamp(0.0, FRAME_HEIGHT);
        }

        let message = json!({
            "frame": frame,
            "camera": camera,
            "timestamp": Utc::now().to_rfc3339(),
        });
        let full_report = config.full_report_every > 0 && frame % config.full_report_every == 0;

        let mut lost = Vec::new();
        for event in &state.events {
            match state.kind_index(event.slot).filter(|index| state.kinds[*index].present) {
                Some(index) => {
                    let value = detection_value(event.slot, index, &state.kinds[index], full_report);
                    raised.push((event.name.clone(), value, message.clone()));
                }
                None => {
                    info!(name = %event.name, "Object permanently lost, notifying subscriber");
                    raised.push((event.name.clone(), Vec::new(), message.clone()));
                    lost.push(event.name.clone());
                }
            }
        }
        state.events.retain(|event| !lost.contains(&event.name));
        (lost, state.focus_point().map(head_angles))
    };

    let mut delivered = 0;
    for (name, value, message) in raised {
        if bus.raise(&name, value, message) {
            delivered += 1;
        }
    }
    // Lost objects get their empty notification before the event goes away.
    for name in &lost {
        bus.remove_subscription(name);
    }
    Frame { delivered, head }
}

async fn follow_focus(motion: &dyn Motion, head: Option<[f32; 2]>) {
    let Some(angles) = head else {
        return;
    };
    if let Err(e) = motion.set_angles("Head", &angles).await {
        warn!(error = %e, ?angles, "Failed to move head toward focused object");
    }
}

/// Encode one detection
///
/// Brief: `[0, label]`. Full: `[1, slot, kind, x, y, label]`.
fn detection_value(slot: i32, index: usize, kind: &ObjectKind, full: bool) -> Vec<Value> {
    let label = if kind.centroid.0 < FRAME_WIDTH / 2.0 { "left" } else { "right" };
    if full {
        vec![
            json!(1),
            json!(slot),
            json!(index),
            json!(kind.centroid.0),
            json!(kind.centroid.1),
            json!(label),
        ]
    } else {
        vec![json!(0), json!(label)]
    }
}

/// Every capability of the in-process device
pub struct LocalDevice {
    pub speech: Arc<LocalSpeech>,
    pub motion: Arc<LocalMotion>,
    pub tracker: Arc<LocalTracker>,
    pub bus: Arc<LocalEventBus>,
    modules: Arc<ModuleRegistry>,
}

impl LocalDevice {
    /// Build the device and spawn its event dispatcher
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(config: LocalDeviceConfig) -> Self {
        debug!(?config, "LocalDevice::spawn: called");
        let modules = Arc::new(ModuleRegistry::new());
        let (bus, dispatcher) = LocalEventBus::new(modules.clone(), config.queue_capacity);
        tokio::spawn(dispatcher.run());

        let bus = Arc::new(bus);
        let motion = Arc::new(LocalMotion::default());
        Self {
            speech: Arc::new(LocalSpeech::default()),
            tracker: Arc::new(LocalTracker::new(bus.clone(), motion.clone(), config)),
            motion,
            bus,
            modules,
        }
    }

    /// Broker exposing all capabilities of this device
    pub fn broker(&self, name: impl Into<String>) -> Broker {
        Broker::new(name, self.modules.clone())
            .with_speech(self.speech.clone())
            .with_motion(self.motion.clone())
            .with_tracker(self.tracker.clone())
            .with_bus(self.bus.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::dataset::{IMAGE_DIR, MASK_DIR};
    use crate::device::traits::{EventBus, EventHandler};
    use crate::device::types::MicroEvent;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<MicroEvent>>,
    }

    impl EventHandler for Recorder {
        fn on_event(&self, _method: &str, event: MicroEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn dataset_dir(images: usize) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(IMAGE_DIR)).unwrap();
        fs::create_dir(dir.path().join(MASK_DIR)).unwrap();
        for i in 0..images {
            fs::write(dir.path().join(IMAGE_DIR).join(format!("{i}.png")), b"img").unwrap();
            fs::write(dir.path().join(MASK_DIR).join(format!("{i}.png")), b"mask").unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn test_motion_validates_part_and_value() {
        let motion = LocalMotion::default();

        motion.set_stiffness("Head", 1.0).await.unwrap();
        assert_eq!(motion.stiffness("Head"), Some(1.0));
        assert!(motion.set_stiffness("Tail", 1.0).await.is_err());
        assert!(motion.set_stiffness("Head", 1.5).await.is_err());
    }

    #[tokio::test]
    async fn test_motion_head_angles_within_limits() {
        let motion = LocalMotion::default();

        motion.set_angles("Head", &[0.2, -0.1]).await.unwrap();
        assert_eq!(motion.angles("Head"), Some(vec![0.2, -0.1]));
        assert!(motion.set_angles("Head", &[0.2]).await.is_err());
        assert!(motion.set_angles("Head", &[3.0, 0.0]).await.is_err());
        assert!(motion.set_angles("Head", &[0.0, f32::NAN]).await.is_err());
        assert!(motion.set_angles("Tail", &[0.0]).await.is_err());
        assert_eq!(motion.angles("Head"), Some(vec![0.2, -0.1]));
    }

    #[test]
    fn test_head_angles_center_and_edges() {
        assert_eq!(head_angles((FRAME_WIDTH / 2.0, FRAME_HEIGHT / 2.0)), [0.0, 0.0]);

        let [yaw, pitch] = head_angles((0.0, FRAME_HEIGHT));
        assert!(yaw > 0.0);
        assert!(pitch > 0.0 && pitch <= HEAD_PITCH_MAX);

        let [yaw, pitch] = head_angles((FRAME_WIDTH, 0.0));
        assert!(yaw < 0.0);
        assert!(pitch < 0.0 && pitch >= HEAD_PITCH_MIN);
    }

    #[tokio::test]
    async fn test_gestures_upsert_and_remove() {
        let device = LocalDevice::spawn(LocalDeviceConfig::default());
        let tracker = &device.tracker;

        tracker.add_gesture("Drink", &[2, 6]).await.unwrap();
        tracker.add_gesture("Drink", &[2, 6, 2]).await.unwrap();
        assert_eq!(tracker.gesture("Drink"), Some(vec![2, 6, 2]));
        assert_eq!(tracker.gesture_count(), 1);

        assert!(tracker.add_gesture("Bad", &[9]).await.is_err());
        assert!(tracker.add_gesture("", &[1]).await.is_err());

        tracker.remove_gesture("Drink").await.unwrap();
        assert!(tracker.remove_gesture("Drink").await.is_err());
    }

    #[tokio::test]
    async fn test_start_and_stop_tracker() {
        let device = LocalDevice::spawn(LocalDeviceConfig::default());
        let tracker = &device.tracker;

        assert!(tracker.start_tracker(0, 0).await.is_err());
        assert!(tracker.start_tracker(15, 2).await.is_err());

        tracker.start_tracker(15, 0).await.unwrap();
        assert!(tracker.is_running());
        tracker.start_tracker(15, 1).await.unwrap();
        assert_eq!(tracker.camera(), Some(1));

        tracker.stop_tracker().await.unwrap();
        assert!(!tracker.is_running());
        tracker.stop_tracker().await.unwrap();
    }

    #[tokio::test]
    async fn test_track_object_rules() {
        let device = LocalDevice::spawn(LocalDeviceConfig::default());
        let tracker = &device.tracker;
        let data = dataset_dir(3);

        assert_eq!(tracker.load_dataset(data.path()).await.unwrap(), 3);
        assert!(!tracker.track_object("cup", -1).await.unwrap());
        assert!(tracker.track_object("cup", 0).await.unwrap());
        assert!(tracker.track_object("cup", 0).await.unwrap());

        tracker.load_dataset(data.path()).await.unwrap();
        assert!(!tracker.track_object("cup", -1).await.unwrap());
        assert!(tracker.track_object("ball", -1).await.unwrap());
        assert_eq!(tracker.tracked_events(), vec!["cup", "ball"]);
    }

    #[tokio::test]
    async fn test_remove_object_kind_reindexes() {
        let device = LocalDevice::spawn(LocalDeviceConfig::default());
        let tracker = &device.tracker;
        let first = dataset_dir(1);
        let second = dataset_dir(2);

        tracker.load_dataset(first.path()).await.unwrap();
        tracker.load_dataset(second.path()).await.unwrap();
        tracker.track_object("cup", 0).await.unwrap();
        tracker.track_object("ball", -1).await.unwrap();

        tracker.remove_object_kind(0).await.unwrap();
        assert_eq!(tracker.kind_count(), 1);
        assert_eq!(tracker.kind_source(0).unwrap(), second.path());
        assert_eq!(tracker.tracked_events(), vec!["ball"]);
        assert!(tracker.track_object("ball", 0).await.unwrap());

        assert!(tracker.remove_object_kind(-1).await.is_err());
        assert!(tracker.remove_object_kind(3).await.is_err());
    }

    #[tokio::test]
    async fn test_focus_object() {
        let device = LocalDevice::spawn(LocalDeviceConfig::default());
        let tracker = &device.tracker;

        assert!(tracker.focus_object(FocusTarget::Any).await.unwrap());
        assert!(!tracker.focus_object(FocusTarget::Slot(0)).await.unwrap());
        assert_eq!(tracker.focus(), Some(FocusTarget::Any));

        let first = dataset_dir(1);
        let second = dataset_dir(1);
        tracker.load_dataset(first.path()).await.unwrap();
        tracker.load_dataset(second.path()).await.unwrap();
        assert!(tracker.focus_object(FocusTarget::Slot(0)).await.unwrap());
        assert_eq!(tracker.focus(), Some(FocusTarget::Slot(0)));
        assert!(tracker.focus_object(FocusTarget::Slot(-1)).await.unwrap());
        assert_eq!(tracker.focus(), Some(FocusTarget::Slot(-1)));

        tracker.stop_focus().await.unwrap();
        assert_eq!(tracker.focus(), None);
    }

    #[tokio::test]
    async fn test_reindex_keeps_focused_slot_distinct_from_any() {
        let device = LocalDevice::spawn(LocalDeviceConfig::default());
        let tracker = &device.tracker;
        let data = dataset_dir(1);
        for _ in 0..3 {
            tracker.load_dataset(data.path()).await.unwrap();
        }

        assert!(tracker.focus_object(FocusTarget::Slot(-2)).await.unwrap());
        tracker.remove_object_kind(0).await.unwrap();

        // The third kind moved to index 1 and keeps the focus.
        assert_eq!(tracker.focus(), Some(FocusTarget::Slot(-1)));
        assert_ne!(tracker.focus(), Some(FocusTarget::Any));

        tracker.remove_object_kind(-1).await.unwrap();
        assert_eq!(tracker.focus(), None);
    }

    #[tokio::test]
    async fn test_any_focus_survives_reindex() {
        let device = LocalDevice::spawn(LocalDeviceConfig::default());
        let tracker = &device.tracker;
        let data = dataset_dir(1);
        tracker.load_dataset(data.path()).await.unwrap();
        tracker.load_dataset(data.path()).await.unwrap();

        tracker.focus_object(FocusTarget::Any).await.unwrap();
        tracker.remove_object_kind(0).await.unwrap();
        assert_eq!(tracker.focus(), Some(FocusTarget::Any));
    }

    #[tokio::test]
    async fn test_focus_moves_head_toward_object() {
        let device = LocalDevice::spawn(LocalDeviceConfig {
            tick_jitter: 0.0,
            ..Default::default()
        });
        let tracker = &device.tracker;
        let first = dataset_dir(1);
        let second = dataset_dir(1);
        tracker.load_dataset(first.path()).await.unwrap();
        tracker.load_dataset(second.path()).await.unwrap();

        tracker.tick().await;
        assert_eq!(device.motion.angles("Head"), None);

        tracker.focus_object(FocusTarget::Slot(-1)).await.unwrap();
        tracker.tick().await;
        let data = tracker.object_data(&[-1], DataFields::ALL).await.unwrap();
        let centroid = data[0].as_ref().and_then(|object| object.centroid).unwrap();
        assert_eq!(device.motion.angles("Head"), Some(head_angles(centroid).to_vec()));

        tracker.lose_object(-1);
        tracker.tick().await;
        assert_eq!(tracker.focus(), None);
    }

    #[tokio::test]
    async fn test_object_data_marks_untracked_slots() {
        let device = LocalDevice::spawn(LocalDeviceConfig::default());
        let tracker = &device.tracker;
        let first = dataset_dir(1);
        let second = dataset_dir(2);
        tracker.load_dataset(first.path()).await.unwrap();
        tracker.load_dataset(second.path()).await.unwrap();
        tracker.lose_object(0);

        let data = tracker
            .object_data(&[-1, 0, -7], DataFields::from_code(1 | 2))
            .await
            .unwrap();
        assert_eq!(data.len(), 3);
        let found = data[0].as_ref().unwrap();
        assert_eq!(found.id, Some(-1));
        assert_eq!(found.kind, Some(1));
        assert!(found.centroid.is_none());
        assert!(data[1].is_none());
        assert!(data[2].is_none());
    }

    #[tokio::test]
    async fn test_zero_queue_capacity_still_delivers() {
        let device = LocalDevice::spawn(LocalDeviceConfig {
            queue_capacity: 0,
            ..Default::default()
        });
        let recorder = Arc::new(Recorder::default());
        device.broker("test").register_module("ObjectTracker", recorder.clone());

        let data = dataset_dir(1);
        device.tracker.load_dataset(data.path()).await.unwrap();
        device.tracker.track_object("cup", 0).await.unwrap();
        device.bus.subscribe("cup", "ObjectTracker", "onObjGet").await.unwrap();

        assert_eq!(device.tracker.tick().await, 1);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(recorder.events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_nan_jitter_does_not_panic() {
        let device = LocalDevice::spawn(LocalDeviceConfig {
            tick_jitter: f32::NAN,
            ..Default::default()
        });
        let data = dataset_dir(1);
        device.tracker.load_dataset(data.path()).await.unwrap();

        device.tracker.tick().await;
        let objects = device.tracker.object_list(DataFields::ALL).await.unwrap();
        let (x, y) = objects[0].centroid.unwrap();
        assert!(x.is_finite() && y.is_finite());
    }

    #[tokio::test]
    async fn test_object_list_honours_fields() {
        let device = LocalDevice::spawn(LocalDeviceConfig::default());
        let tracker = &device.tracker;
        let data = dataset_dir(2);
        tracker.load_dataset(data.path()).await.unwrap();

        let objects = tracker.object_list(DataFields::from_code(1 | 8)).await.unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].id, Some(0));
        assert!(objects[0].kind.is_none());
        assert!(objects[0].centroid.is_none());
        assert!(objects[0].area.is_some());

        tracker.lose_object(0);
        assert!(tracker.object_list(DataFields::ALL).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tick_raises_brief_and_full_detections() {
        let config = LocalDeviceConfig {
            full_report_every: 2,
            ..Default::default()
        };
        let device = LocalDevice::spawn(config);
        let recorder = Arc::new(Recorder::default());
        let broker = device.broker("test");
        broker.register_module("ObjectTracker", recorder.clone());

        let data = dataset_dir(1);
        device.tracker.load_dataset(data.path()).await.unwrap();
        device.tracker.track_object("cup", 0).await.unwrap();
        device.bus.subscribe("cup", "ObjectTracker", "onObjGet").await.unwrap();

        assert_eq!(device.tracker.tick().await, 1);
        assert_eq!(device.tracker.tick().await, 1);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let events = recorder.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].value.len(), 2);
        assert_eq!(events[0].value[0], json!(0));
        assert_eq!(events[1].value.len(), 6);
        assert_eq!(events[1].value[0], json!(1));
        assert_eq!(events[1].message["frame"], json!(2));
    }

    #[tokio::test]
    async fn test_lost_object_notifies_once() {
        let device = LocalDevice::spawn(LocalDeviceConfig::default());
        let recorder = Arc::new(Recorder::default());
        device.broker("test").register_module("ObjectTracker", recorder.clone());

        let data = dataset_dir(1);
        device.tracker.load_dataset(data.path()).await.unwrap();
        device.tracker.track_object("cup", 0).await.unwrap();
        device.bus.subscribe("cup", "ObjectTracker", "onObjGet").await.unwrap();

        assert!(device.tracker.lose_object(0));
        assert_eq!(device.tracker.tick().await, 1);
        assert_eq!(device.tracker.tick().await, 0);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(device.tracker.tracked_events().is_empty());
        assert!(!device.bus.is_subscribed("cup"));
        let events = recorder.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].value.is_empty());
    }
}
