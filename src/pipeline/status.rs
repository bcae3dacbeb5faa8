// ABOUTME: Closed status and stage-kind enums for deployments and build stages.
// ABOUTME: Serialized via serde; no stringly-typed states anywhere.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The three stages of one build cycle, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageKind {
    Pull,
    Build,
    Run,
}

impl StageKind {
    /// Phase label used for command logs (`{phase}_{build_number}`).
    pub fn phase(&self) -> &'static str {
        match self {
            StageKind::Pull => "Pull",
            StageKind::Build => "Build",
            StageKind::Run => "Run",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.phase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageStatus {
    Waiting,
    Processing,
    Done,
    Failed,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageStatus::Waiting => write!(f, "Waiting"),
            StageStatus::Processing => write!(f, "Processing"),
            StageStatus::Done => write!(f, "Done"),
            StageStatus::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentStatus {
    Waiting,
    Processing,
    Done,
    Failed,
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentStatus::Waiting => write!(f, "Waiting"),
            DeploymentStatus::Processing => write!(f, "Processing"),
            DeploymentStatus::Done => write!(f, "Done"),
            DeploymentStatus::Failed => write!(f, "Failed"),
        }
    }
}
