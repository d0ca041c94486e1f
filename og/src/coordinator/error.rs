//! Coordinator error types

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::device::DeviceError;

/// Errors surfaced by [`DeviceCoordinator`](super::DeviceCoordinator)
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Capability {capability} is unavailable")]
    CapabilityUnavailable { capability: &'static str },

    #[error("Remote call {operation} failed: {source}")]
    RemoteCallFailed {
        operation: &'static str,
        #[source]
        source: DeviceError,
    },

    #[error("Failed to load dataset {path}: {reason}")]
    DatasetLoadError { path: PathBuf, reason: String },

    #[error("Remote call {operation} timed out after {timeout:?}")]
    RemoteCallTimeout { operation: &'static str, timeout: Duration },

    #[error("Coordinator has been unloaded")]
    CoordinatorUnloaded,

    #[error("Kind '{0}' is already tracked")]
    KindAlreadyTracked(String),
}

impl CoordinatorError {
    /// Remote call failure built from a device refusal
    pub fn refused(operation: &'static str, reason: impl Into<String>) -> Self {
        CoordinatorError::RemoteCallFailed {
            operation,
            source: DeviceError::rejected(reason),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CoordinatorError::RemoteCallTimeout { .. })
    }

    pub fn is_unloaded(&self) -> bool {
        matches!(self, CoordinatorError::CoordinatorUnloaded)
    }
}
