//! Broker - explicit context holding capability handles and modules
//!
//! Everything that would otherwise be ambient process state (the capability
//! proxies and the table of named event-handling modules) lives here and is
//! passed to whoever needs it.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use super::error::DeviceError;
use super::traits::{EventBus, EventHandler, GestureTracker, Motion, Speech};

/// Named modules able to receive micro-events
#[derive(Default)]
pub struct ModuleRegistry {
    modules: RwLock<HashMap<String, Arc<dyn EventHandler>>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module, replacing any module with the same name
    pub fn register(&self, name: &str, handler: Arc<dyn EventHandler>) {
        debug!(%name, "ModuleRegistry::register: called");
        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        modules.insert(name.to_string(), handler);
    }

    /// Remove a module; returns false if it was not registered
    pub fn unregister(&self, name: &str) -> bool {
        debug!(%name, "ModuleRegistry::unregister: called");
        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        modules.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn EventHandler>> {
        let modules = self.modules.read().unwrap_or_else(PoisonError::into_inner);
        modules.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        let modules = self.modules.read().unwrap_or_else(PoisonError::into_inner);
        modules.contains_key(name)
    }
}

/// Connection context to one device
///
/// Cheap to clone; clones share the same handles and module table.
#[derive(Clone)]
pub struct Broker {
    name: String,
    modules: Arc<ModuleRegistry>,
    speech: Option<Arc<dyn Speech>>,
    motion: Option<Arc<dyn Motion>>,
    tracker: Option<Arc<dyn GestureTracker>>,
    bus: Option<Arc<dyn EventBus>>,
}

impl Broker {
    /// Create a broker with no capabilities attached
    pub fn new(name: impl Into<String>, modules: Arc<ModuleRegistry>) -> Self {
        let name = name.into();
        debug!(%name, "Broker::new: called");
        Self {
            name,
            modules,
            speech: None,
            motion: None,
            tracker: None,
            bus: None,
        }
    }

    pub fn with_speech(mut self, speech: Arc<dyn Speech>) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn with_motion(mut self, motion: Arc<dyn Motion>) -> Self {
        self.motion = Some(motion);
        self
    }

    pub fn with_tracker(mut self, tracker: Arc<dyn GestureTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn with_bus(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn speech(&self) -> Result<Arc<dyn Speech>, DeviceError> {
        debug!(broker = %self.name, "Broker::speech: called");
        self.speech
            .clone()
            .ok_or(DeviceError::Unavailable { capability: "speech" })
    }

    pub fn motion(&self) -> Result<Arc<dyn Motion>, DeviceError> {
        debug!(broker = %self.name, "Broker::motion: called");
        self.motion
            .clone()
            .ok_or(DeviceError::Unavailable { capability: "motion" })
    }

    pub fn tracker(&self) -> Result<Arc<dyn GestureTracker>, DeviceError> {
        debug!(broker = %self.name, "Broker::tracker: called");
        self.tracker
            .clone()
            .ok_or(DeviceError::Unavailable { capability: "tracker" })
    }

    pub fn bus(&self) -> Result<Arc<dyn EventBus>, DeviceError> {
        debug!(broker = %self.name, "Broker::bus: called");
        self.bus
            .clone()
            .ok_or(DeviceError::Unavailable { capability: "event-bus" })
    }

    pub fn register_module(&self, name: &str, handler: Arc<dyn EventHandler>) {
        self.modules.register(name, handler);
    }

    pub fn unregister_module(&self, name: &str) -> bool {
        self.modules.unregister(name)
    }

    pub fn modules(&self) -> Arc<ModuleRegistry> {
        self.modules.clone()
    }
}
