//! Error types for the transponder parameter model.

use thiserror::Error;

use crate::types::FrontendType;

/// Errors raised while reading or constructing transponder parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    /// The parameters describe a different front-end family than requested.
    #[error("Transponder type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: FrontendType,
        actual: FrontendType,
    },

    /// A DiSEqC command string could not be parsed.
    #[error("Invalid DiSEqC command: {0}")]
    InvalidDiseqcCommand(String),

    /// A numeric field is outside its physical range.
    #[error("Value out of range for {field}: {value}")]
    OutOfRange { field: &'static str, value: i64 },
}
