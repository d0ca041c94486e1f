//! DeviceCoordinator - sequences setup, tracking, kind loading and teardown

use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{MutexGuard, broadcast};
use tracing::{debug, info, warn};

use super::config::CoordinatorConfig;
use super::error::CoordinatorError;
use super::handler::{KindDetection, KindEventHandler};
use super::registry::{GestureTable, TrackedKindRegistry};
use super::state::CoordinatorState;
use crate::device::{Broker, DataFields, DeviceError, EventBus, GestureTracker, Motion, ObjectSnapshot, Speech};

/// Outcome of a best-effort teardown
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnloadReport {
    /// Device-side kinds removed successfully
    pub kinds_removed: usize,
    /// Gestures removed successfully
    pub gestures_removed: usize,
    /// One entry per failed teardown step
    pub failures: Vec<String>,
}

impl UnloadReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, step: String, err: CoordinatorError) {
        warn!(%step, error = %err, "Teardown step failed, continuing");
        self.failures.push(format!("{}: {}", step, err));
    }
}

/// Run one remote call under a timeout
async fn call<T>(
    operation: &'static str,
    timeout: Duration,
    fut: impl Future<Output = Result<T, DeviceError>>,
) -> Result<T, CoordinatorError> {
    debug!(%operation, ?timeout, "call: called");
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(CoordinatorError::RemoteCallFailed { operation, source }),
        Err(_) => {
            warn!(%operation, ?timeout, "Remote call timed out");
            Err(CoordinatorError::RemoteCallTimeout { operation, timeout })
        }
    }
}

/// Coordinates one module's use of the device capabilities
///
/// Mutating operations are serialized; event handling runs concurrently on
/// the bus's delivery task and only reads the kind registry.
pub struct DeviceCoordinator {
    config: CoordinatorConfig,
    broker: Broker,
    speech: Arc<dyn Speech>,
    motion: Arc<dyn Motion>,
    tracker: Arc<dyn GestureTracker>,
    bus: Arc<dyn EventBus>,
    kinds: Arc<RwLock<TrackedKindRegistry>>,
    gestures: Mutex<GestureTable>,
    state: Mutex<CoordinatorState>,
    handler: Arc<KindEventHandler>,
    sequencer: tokio::sync::Mutex<()>,
}

impl DeviceCoordinator {
    /// Acquire capabilities, prepare the device and register the handler module
    pub async fn initialize(broker: &Broker, config: CoordinatorConfig) -> Result<Self, CoordinatorError> {
        info!(name = %config.name, broker = %broker.name(), "Initializing coordinator");

        let speech = broker
            .speech()
            .map_err(|_| CoordinatorError::CapabilityUnavailable { capability: "speech" })?;
        let motion = broker
            .motion()
            .map_err(|_| CoordinatorError::CapabilityUnavailable { capability: "motion" })?;
        let tracker = broker
            .tracker()
            .map_err(|_| CoordinatorError::CapabilityUnavailable { capability: "tracker" })?;
        let bus = broker
            .bus()
            .map_err(|_| CoordinatorError::CapabilityUnavailable { capability: "event-bus" })?;

        let timeout = config.call_timeout();
        call(
            "set_stiffness",
            timeout,
            motion.set_stiffness(&config.stiffness_part, config.stiffness),
        )
        .await?;
        call(
            "start_tracker",
            timeout,
            tracker.start_tracker(config.tracker_fps, config.default_camera),
        )
        .await?;

        let kinds = Arc::new(RwLock::new(TrackedKindRegistry::new()));
        let (detections, _) = broadcast::channel(config.detection_buffer.max(1));
        let handler = Arc::new(KindEventHandler::new(&config.event_method, kinds.clone(), detections));

        let coordinator = Self {
            config,
            broker: broker.clone(),
            speech,
            motion,
            tracker,
            bus,
            kinds,
            gestures: Mutex::new(GestureTable::default()),
            state: Mutex::new(CoordinatorState::Initialized),
            handler,
            sequencer: tokio::sync::Mutex::new(()),
        };

        for gesture in coordinator.config.gestures.clone() {
            if let Err(e) = coordinator.register_gesture(&gesture.name, &gesture.keypoints).await {
                warn!(gesture = %gesture.name, error = %e, "Gesture setup failed, stopping tracker");
                if let Err(stop) = call("stop_tracker", timeout, coordinator.tracker.stop_tracker()).await {
                    warn!(error = %stop, "Failed to stop tracker after gesture setup failure");
                }
                return Err(e);
            }
        }

        broker.register_module(&coordinator.config.name, coordinator.handler.clone());
        info!(
            name = %coordinator.config.name,
            gestures = coordinator.config.gestures.len(),
            "Coordinator initialized"
        );
        Ok(coordinator)
    }

    /// Module name the handler is registered under
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn state(&self) -> CoordinatorState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tracked kind names in device order
    pub fn kinds(&self) -> Vec<String> {
        self.read_kinds().names().to_vec()
    }

    /// Registered gestures sorted by name
    pub fn gestures(&self) -> Vec<(String, Vec<i32>)> {
        self.gestures.lock().unwrap_or_else(PoisonError::into_inner).entries()
    }

    /// Receive every detection decoded from now on
    pub fn subscribe_detections(&self) -> broadcast::Receiver<KindDetection> {
        self.handler.subscribe()
    }

    /// Upsert a gesture on the device
    pub async fn register_gesture(&self, name: &str, keypoints: &[i32]) -> Result<(), CoordinatorError> {
        debug!(%name, ?keypoints, "register_gesture: called");
        let _guard = self.begin().await?;
        call(
            "add_gesture",
            self.config.call_timeout(),
            self.tracker.add_gesture(name, keypoints),
        )
        .await?;
        let added = self
            .gestures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .upsert(name, keypoints);
        info!(%name, ?keypoints, replaced = !added, "Gesture registered");
        Ok(())
    }

    /// Start the tracker on a camera and follow the configured focus target
    pub async fn start_tracking(&self, camera_id: i32) -> Result<(), CoordinatorError> {
        debug!(%camera_id, "start_tracking: called");
        let _guard = self.begin().await?;
        let timeout = self.config.call_timeout();
        call(
            "start_tracker",
            timeout,
            self.tracker.start_tracker(self.config.tracker_fps, camera_id),
        )
        .await?;
        let focused = call("focus_object", timeout, self.tracker.focus_object(self.config.focus_target)).await?;
        if !focused {
            return Err(CoordinatorError::refused(
                "focus_object",
                format!("target {} cannot be followed", self.config.focus_target),
            ));
        }
        self.transition(CoordinatorState::Tracking);
        Ok(())
    }

    /// Stop the tracker and head focus
    pub async fn stop_tracking(&self) -> Result<(), CoordinatorError> {
        debug!("stop_tracking: called");
        let _guard = self.begin().await?;
        let timeout = self.config.call_timeout();
        call("stop_tracker", timeout, self.tracker.stop_tracker()).await?;
        call("stop_focus", timeout, self.tracker.stop_focus()).await?;
        self.transition(CoordinatorState::Idle);
        Ok(())
    }

    /// Load a dataset as a new kind and subscribe to its detections
    ///
    /// Returns the kind's registry index.
    pub async fn load_dataset(&self, path: &Path, kind: &str) -> Result<usize, CoordinatorError> {
        debug!(path = %path.display(), %kind, "load_dataset: called");
        let _guard = self.begin().await?;
        if self.read_kinds().contains(kind) {
            return Err(CoordinatorError::KindAlreadyTracked(kind.to_string()));
        }
        let timeout = self.config.call_timeout();

        let images = call("load_dataset", timeout, self.tracker.load_dataset(path))
            .await
            .map_err(|e| match e {
                CoordinatorError::RemoteCallFailed {
                    source: DeviceError::Dataset { path, reason },
                    ..
                } => CoordinatorError::DatasetLoadError { path, reason },
                other => other,
            })?;

        let slot = self.read_kinds().next_slot();
        match call("track_object", timeout, self.tracker.track_object(kind, slot)).await {
            Ok(true) => {}
            Ok(false) => {
                self.discard_kind(slot).await;
                return Err(CoordinatorError::refused(
                    "track_object",
                    format!("device refused to track '{}' at slot {}", kind, slot),
                ));
            }
            Err(e) => {
                self.discard_kind(slot).await;
                return Err(e);
            }
        }

        let index = self.write_kinds().push(kind);
        if let Err(e) = call(
            "subscribe",
            timeout,
            self.bus.subscribe(kind, &self.config.name, &self.config.event_method),
        )
        .await
        {
            self.write_kinds().pop_if(kind);
            self.discard_kind(slot).await;
            return Err(e);
        }

        info!(%kind, %index, %slot, %images, "Kind loaded");
        Ok(index)
    }

    /// Handle one micro-event as the bus would deliver it
    pub fn on_event(&self, key: &str, value: &[Value], message: &Value) -> Option<KindDetection> {
        self.handler.handle(key, value, message)
    }

    pub async fn announce(&self, text: &str) -> Result<(), CoordinatorError> {
        debug!(%text, "announce: called");
        self.ensure_active()?;
        call("say", self.config.call_timeout(), self.speech.say(text)).await
    }

    /// Snapshot of currently tracked objects
    pub async fn objects(&self, fields: DataFields) -> Result<Vec<ObjectSnapshot>, CoordinatorError> {
        debug!(code = fields.code(), "objects: called");
        self.ensure_active()?;
        call("object_list", self.config.call_timeout(), self.tracker.object_list(fields)).await
    }

    /// Per-kind snapshot of the named kinds
    ///
    /// Entries line up with `kinds`. A kind that is not tracked, or whose
    /// object is out of view, yields `None`.
    pub async fn object_data(
        &self,
        kinds: &[&str],
        fields: DataFields,
    ) -> Result<Vec<Option<ObjectSnapshot>>, CoordinatorError> {
        debug!(?kinds, code = fields.code(), "object_data: called");
        self.ensure_active()?;
        let slots: Vec<Option<i32>> = {
            let registry = self.read_kinds();
            kinds
                .iter()
                .map(|kind| registry.position(kind).map(TrackedKindRegistry::slot_for))
                .collect()
        };
        let query: Vec<i32> = slots.iter().flatten().copied().collect();
        if query.is_empty() {
            return Ok(vec![None; kinds.len()]);
        }

        let timeout = self.config.call_timeout();
        let mut found = call("object_data", timeout, self.tracker.object_data(&query, fields))
            .await?
            .into_iter();
        Ok(slots
            .into_iter()
            .map(|slot| slot.and_then(|_| found.next().flatten()))
            .collect())
    }

    /// Tear down everything this coordinator installed
    ///
    /// Individual failures are logged and reported; teardown always runs to
    /// completion and leaves the coordinator unloaded.
    pub async fn unload(&self) -> Result<UnloadReport, CoordinatorError> {
        debug!("unload: called");
        let _guard = self.begin().await?;
        info!(name = %self.config.name, "Unloading coordinator");
        let timeout = self.config.call_timeout();
        let mut report = UnloadReport::default();

        if let Err(e) = call("stop_tracker", timeout, self.tracker.stop_tracker()).await {
            report.record("stop_tracker".to_string(), e);
        }
        if let Err(e) = call("stop_focus", timeout, self.tracker.stop_focus()).await {
            report.record("stop_focus".to_string(), e);
        }

        // Highest index first so earlier slots stay valid if the device re-indexes
        let names = self.kinds();
        for (index, name) in names.iter().enumerate().rev() {
            let slot = TrackedKindRegistry::slot_for(index);
            match call("remove_object_kind", timeout, self.tracker.remove_object_kind(slot)).await {
                Ok(()) => report.kinds_removed += 1,
                Err(e) => report.record(format!("remove_object_kind({})", slot), e),
            }
            if let Err(e) = call("unsubscribe", timeout, self.bus.unsubscribe(name)).await {
                report.record(format!("unsubscribe({})", name), e);
            }
        }
        self.write_kinds().clear();

        let gestures = self.gestures.lock().unwrap_or_else(PoisonError::into_inner).names();
        for name in gestures {
            match call("remove_gesture", timeout, self.tracker.remove_gesture(&name)).await {
                Ok(()) => report.gestures_removed += 1,
                Err(e) => report.record(format!("remove_gesture({})", name), e),
            }
        }
        self.gestures.lock().unwrap_or_else(PoisonError::into_inner).clear();

        self.broker.unregister_module(&self.config.name);
        self.transition(CoordinatorState::Unloaded);
        info!(
            kinds = report.kinds_removed,
            gestures = report.gestures_removed,
            failures = report.failures.len(),
            "Coordinator unloaded"
        );
        Ok(report)
    }

    /// Acquire the sequencer, refusing once unloaded
    async fn begin(&self) -> Result<MutexGuard<'_, ()>, CoordinatorError> {
        let guard = self.sequencer.lock().await;
        self.ensure_active()?;
        Ok(guard)
    }

    fn ensure_active(&self) -> Result<(), CoordinatorError> {
        if self.state().is_unloaded() {
            debug!("ensure_active: coordinator unloaded");
            return Err(CoordinatorError::CoordinatorUnloaded);
        }
        Ok(())
    }

    fn transition(&self, next: CoordinatorState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let from = *state;
        if from != next {
            info!(%from, to = %next, "Coordinator state changed");
            *state = next;
        }
    }

    /// Best-effort removal of a kind the registry never recorded
    async fn discard_kind(&self, slot: i32) {
        debug!(%slot, "discard_kind: called");
        let timeout = self.config.call_timeout();
        if let Err(e) = call("remove_object_kind", timeout, self.tracker.remove_object_kind(slot)).await {
            warn!(%slot, error = %e, "Failed to roll back device kind");
        }
    }

    fn read_kinds(&self) -> RwLockReadGuard<'_, TrackedKindRegistry> {
        self.kinds.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_kinds(&self) -> RwLockWriteGuard<'_, TrackedKindRegistry> {
        self.kinds.write().unwrap_or_else(PoisonError::into_inner)
    }
}
