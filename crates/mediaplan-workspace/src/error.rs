use std::path::PathBuf;

use mediaplan_schema::SchemaError;
use mediaplan_types::ModelError;
use thiserror::Error;

/// Errors from workspace configuration, storage and upgrades.
#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("plan {path} has no meta.schema_version")]
    MissingVersion { path: PathBuf },

    #[error(
        "{} plan file(s) use unsupported schema versions; upgrade aborted: {}",
        files.len(),
        files.iter().map(|f| f.display().to_string()).collect::<Vec<_>>().join(", ")
    )]
    UnsupportedPlans { files: Vec<PathBuf> },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl WorkspaceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;
