//! Error types for the feature host.

use thiserror::Error;
use wasm_bindgen::JsValue;

/// Failures talking to the persisted settings store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage API is missing or rejected the call
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// A stored value did not have the expected shape
    #[error("Malformed value under `{key}`: {reason}")]
    Malformed { key: String, reason: String },

    /// Writing back to storage failed
    #[error("Failed to write `{key}`: {reason}")]
    Write { key: String, reason: String },
}

/// Failures raised while mounting or unmounting a feature payload.
#[derive(Debug, Error)]
pub enum MountError {
    #[error("DOM error: {0}")]
    Dom(String),

    #[error("Script error: {0}")]
    Script(String),

    /// The handle kind does not fit the feature's behavior
    #[error("Mounted handle does not match the behavior of `{0}`")]
    HandleMismatch(String),
}

impl From<JsValue> for MountError {
    fn from(value: JsValue) -> Self {
        MountError::Dom(format!("{:?}", value))
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Feature `{0}` is registered twice")]
    DuplicateId(String),

    #[error("Invalid match pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Per-feature lifecycle failures. These never escape a batch evaluation.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Feature `{feature}` failed to activate: {source}")]
    Activate {
        feature: String,
        #[source]
        source: MountError,
    },

    #[error("Feature `{feature}` failed to update: {source}")]
    Update {
        feature: String,
        #[source]
        source: MountError,
    },

    #[error("Feature `{feature}` failed to clean up: {source}")]
    Deactivate {
        feature: String,
        #[source]
        source: MountError,
    },

    #[error("Feature `{0}` is not registered")]
    UnknownFeature(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid host configuration: {0}")]
    Invalid(String),
}
