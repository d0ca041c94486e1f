//! objectgesture - event-driven coordinator over robot tracking capabilities
//!
//! A [`DeviceCoordinator`] acquires speech, motion, object/gesture tracking
//! and event-bus capabilities from a [`Broker`], registers gestures, loads
//! datasets as trackable object kinds, and decodes the micro-events the
//! tracker raises for those kinds into [`Detection`] values.
//!
//! # Modules
//!
//! - [`coordinator`] - The coordinator, its registries and payload decoding
//! - [`device`] - Capability traits, the broker and the in-process device
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod device;

// Re-export commonly used types
pub use config::Config;
pub use coordinator::{
    CoordinatorConfig, CoordinatorError, CoordinatorState, Detection, DeviceCoordinator, KindDetection, UnloadReport,
};
pub use device::{Broker, DeviceError, LocalDevice, ModuleRegistry};
