//! Local micro-event bus
//!
//! Subscriptions map an event key to a (module, method) pair. Raised events
//! are queued and delivered by an [`EventDispatcher`] task, so handlers always
//! run on the bus's delivery task rather than on the raiser's.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::broker::ModuleRegistry;
use super::error::DeviceError;
use super::traits::EventBus;
use super::types::MicroEvent;

/// Default number of queued deliveries before new events are dropped
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
struct Subscription {
    handler: String,
    method: String,
}

/// Event routed to a module method
#[derive(Debug)]
struct Delivery {
    handler: String,
    method: String,
    event: MicroEvent,
}

/// In-process event bus
pub struct LocalEventBus {
    modules: Arc<ModuleRegistry>,
    subscriptions: RwLock<HashMap<String, Subscription>>,
    tx: mpsc::Sender<Delivery>,
}

impl LocalEventBus {
    /// Create a bus and the dispatcher that delivers its events
    ///
    /// The dispatcher must be spawned (`tokio::spawn(dispatcher.run())`) for
    /// handlers to be called.
    pub fn new(modules: Arc<ModuleRegistry>, capacity: usize) -> (Self, EventDispatcher) {
        debug!(capacity, "LocalEventBus::new: called");
        // A zero-sized channel would panic; keep room for one event.
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let bus = Self {
            modules: modules.clone(),
            subscriptions: RwLock::new(HashMap::new()),
            tx,
        };
        (bus, EventDispatcher { rx, modules })
    }

    /// Raise an event
    ///
    /// Returns false if nobody subscribed to `key` or the delivery queue is
    /// full. Never blocks.
    pub fn raise(&self, key: &str, value: Vec<Value>, message: Value) -> bool {
        let subscription = {
            let subscriptions = self.subscriptions.read().unwrap_or_else(PoisonError::into_inner);
            subscriptions.get(key).cloned()
        };
        let Some(subscription) = subscription else {
            debug!(%key, "LocalEventBus::raise: no subscriber");
            return false;
        };

        let delivery = Delivery {
            handler: subscription.handler,
            method: subscription.method,
            event: MicroEvent::new(key, value, message),
        };
        match self.tx.try_send(delivery) {
            Ok(()) => true,
            Err(e) => {
                warn!(%key, "Dropping micro-event: {}", e);
                false
            }
        }
    }

    /// Drop the subscription for `key`; returns false if there was none
    pub fn remove_subscription(&self, key: &str) -> bool {
        let mut subscriptions = self.subscriptions.write().unwrap_or_else(PoisonError::into_inner);
        subscriptions.remove(key).is_some()
    }

    pub fn is_subscribed(&self, key: &str) -> bool {
        let subscriptions = self.subscriptions.read().unwrap_or_else(PoisonError::into_inner);
        subscriptions.contains_key(key)
    }

    pub fn subscription_count(&self) -> usize {
        let subscriptions = self.subscriptions.read().unwrap_or_else(PoisonError::into_inner);
        subscriptions.len()
    }
}

#[async_trait]
impl EventBus for LocalEventBus {
    async fn subscribe(&self, key: &str, handler: &str, method: &str) -> Result<(), DeviceError> {
        debug!(%key, %handler, %method, "LocalEventBus::subscribe: called");
        if !self.modules.contains(handler) {
            return Err(DeviceError::UnknownModule {
                name: handler.to_string(),
            });
        }

        let mut subscriptions = self.subscriptions.write().unwrap_or_else(PoisonError::into_inner);
        let previous = subscriptions.insert(
            key.to_string(),
            Subscription {
                handler: handler.to_string(),
                method: method.to_string(),
            },
        );
        if previous.is_some() {
            debug!(%key, "LocalEventBus::subscribe: replaced existing subscription");
        }
        Ok(())
    }

    async fn unsubscribe(&self, key: &str) -> Result<(), DeviceError> {
        debug!(%key, "LocalEventBus::unsubscribe: called");
        if self.remove_subscription(key) {
            Ok(())
        } else {
            Err(DeviceError::rejected(format!("no subscription for '{}'", key)))
        }
    }
}

/// Delivery task for a [`LocalEventBus`]
pub struct EventDispatcher {
    rx: mpsc::Receiver<Delivery>,
    modules: Arc<ModuleRegistry>,
}

impl EventDispatcher {
    /// Deliver events until the bus is dropped
    pub async fn run(mut self) {
        info!("Event dispatcher started");

        while let Some(delivery) = self.rx.recv().await {
            match self.modules.get(&delivery.handler) {
                Some(handler) => {
                    debug!(key = %delivery.event.key, handler = %delivery.handler, "Delivering micro-event");
                    handler.on_event(&delivery.method, delivery.event);
                }
                None => {
                    warn!(
                        key = %delivery.event.key,
                        handler = %delivery.handler,
                        "Handler module gone, dropping micro-event"
                    );
                }
            }
        }

        info!("Event dispatcher stopped");
    }
}
