//! Error types for the tuning engine.

use thiserror::Error;

use dvbfe_params::ParamError;

use crate::driver::DriverError;

/// Errors returned by front-end and group operations.
///
/// Every failure is scoped to one front-end and one tune attempt; a
/// front-end left in `Failed` always accepts a new tune.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Parameters rejected before any hardware command was issued.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// The front-end (or a linked dependent) is busy or not available.
    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// The driver rejected a hardware command.
    #[error("Device command '{command}' failed: {source}")]
    DeviceCommandFailed {
        command: &'static str,
        #[source]
        source: DriverError,
    },

    /// No lock was reported before the tune deadline.
    #[error("Lock timeout")]
    LockTimeout,

    /// No front-end with this index exists in the group.
    #[error("Unknown frontend: {0}")]
    UnknownFrontend(usize),

    /// The link relation between front-ends is not a set of simple chains.
    #[error("Invalid frontend topology: {0}")]
    InvalidTopology(String),
}

impl EngineError {
    pub(crate) fn device(command: &'static str, source: DriverError) -> Self {
        EngineError::DeviceCommandFailed { command, source }
    }
}

impl From<ParamError> for EngineError {
    fn from(e: ParamError) -> Self {
        EngineError::InvalidParameters(e.to_string())
    }
}

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, EngineError>;
