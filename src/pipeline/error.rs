// ABOUTME: Pipeline error types with SNAFU pattern.
// ABOUTME: Unifies execution, store, and snapshot failures for programmatic handling.

use crate::artifact::SnapshotError;
use crate::exec::ExecError;
use crate::store::StoreError;
use chrono::{DateTime, Utc};
use snafu::Snafu;

/// Errors raised by pipeline operations. Stage and deployment statuses are
/// already committed as Failed by the time one of these reaches the caller.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    #[snafu(display("deployment not found: {name}"))]
    DeploymentNotFound { name: String },

    #[snafu(display("command execution failed: {source}"))]
    Execution { source: ExecError },

    #[snafu(display("state store failure: {source}"))]
    Store { source: StoreError },

    #[snafu(display("snapshot failure: {source}"))]
    Snapshot { source: SnapshotError },

    #[snafu(display("pipeline lock held by {holder} (pid {pid}) since {since}"))]
    LockHeld {
        holder: String,
        pid: u32,
        since: DateTime<Utc>,
    },

    #[snafu(display("pipeline lock error: {message}"))]
    Lock { message: String },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineErrorKind {
    /// The deployment (or one of its records) does not exist.
    NotFound,
    /// An external command failed, timed out, or could not be spawned.
    Execution,
    /// The persistent store failed.
    Store,
    /// The configuration snapshot could not be read or written.
    Snapshot,
    /// The per-deployment lock could not be acquired.
    Lock,
}

impl PipelineError {
    pub fn kind(&self) -> PipelineErrorKind {
        match self {
            PipelineError::DeploymentNotFound { .. } => PipelineErrorKind::NotFound,
            PipelineError::Execution { .. } => PipelineErrorKind::Execution,
            PipelineError::Store {
                source:
                    StoreError::DeploymentNotFound(_)
                    | StoreError::StageNotFound(_)
                    | StoreError::NoCycle(_),
            } => PipelineErrorKind::NotFound,
            PipelineError::Store { .. } => PipelineErrorKind::Store,
            PipelineError::Snapshot { .. } => PipelineErrorKind::Snapshot,
            PipelineError::LockHeld { .. } | PipelineError::Lock { .. } => PipelineErrorKind::Lock,
        }
    }
}

impl From<ExecError> for PipelineError {
    fn from(source: ExecError) -> Self {
        PipelineError::Execution { source }
    }
}

impl From<StoreError> for PipelineError {
    fn from(source: StoreError) -> Self {
        match source {
            StoreError::DeploymentNotFound(name) => PipelineError::DeploymentNotFound { name },
            other => PipelineError::Store { source: other },
        }
    }
}

impl From<SnapshotError> for PipelineError {
    fn from(source: SnapshotError) -> Self {
        PipelineError::Snapshot { source }
    }
}
