// ABOUTME: Application-wide error types for dockhand.
// ABOUTME: Uses thiserror for the crate-level taxonomy.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("version {version:?} is not known for framework {framework}")]
    VersionMismatch { framework: String, version: String },

    #[error("invalid configuration: {0}")]
    Validation(String),

    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("command execution failed: {0}")]
    Execution(#[from] crate::exec::ExecError),

    #[error("state store failure: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("snapshot failure: {0}")]
    Snapshot(#[from] crate::artifact::SnapshotError),

    #[error(transparent)]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
