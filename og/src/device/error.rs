//! Device capability error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by a device capability
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Capability {capability} is not available")]
    Unavailable { capability: &'static str },

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Bad dataset at {path}: {reason}")]
    Dataset { path: PathBuf, reason: String },

    #[error("No module registered as '{name}'")]
    UnknownModule { name: String },
}

impl DeviceError {
    /// Shorthand for a rejected request
    pub fn rejected(reason: impl Into<String>) -> Self {
        DeviceError::Rejected(reason.into())
    }

    /// Shorthand for a dataset problem
    pub fn dataset(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        DeviceError::Dataset {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
