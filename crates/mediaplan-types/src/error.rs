//! Model-level error types.

use thiserror::Error;

/// Errors raised while parsing versions or converting plan documents.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// The version string is empty, has too few or too many components,
    /// or contains a non-integer component.
    #[error("invalid version format '{version}': {reason}")]
    InvalidFormat { version: String, reason: String },
}

/// Errors raised while mapping a JSON document onto the typed plan model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("formula_type cannot be empty")]
    EmptyFormulaType,

    #[error("unknown formula_type '{0}'")]
    UnknownFormulaType(String),

    #[error("line item field '{field}' is not a valid decimal: {value}")]
    InvalidDecimal { field: String, value: String },

    #[error("line item is missing required field '{0}'")]
    MissingField(String),

    #[error("malformed plan document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;
