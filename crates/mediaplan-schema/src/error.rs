use mediaplan_types::VersionError;
use thiserror::Error;

/// Errors from schema lookup, validation and migration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error(transparent)]
    InvalidVersionFormat(#[from] VersionError),

    #[error("schema version '{version}' is not supported: {message}")]
    UnsupportedVersion { version: String, message: String },

    #[error("no migration path from {from} to {to}")]
    NoMigrationPath { from: String, to: String },

    #[error("no {kind} schema for version {version}")]
    SchemaNotFound { kind: String, version: String },

    #[error("migration {from} -> {to} failed: {reason}")]
    MigrationFailed {
        from: String,
        to: String,
        reason: String,
    },

    #[error("malformed plan document: {0}")]
    MalformedDocument(String),
}

pub type SchemaResult<T> = Result<T, SchemaError>;
