// ABOUTME: Persistent store boundary for deployments and build cycles.
// ABOUTME: Trait seam with in-memory and JSON-file implementations.

mod file;
mod memory;

pub use file::JsonStore;
pub use memory::MemoryStore;

use crate::config::GitBinding;
use crate::pipeline::{DeploymentStatus, StageKind, StageStatus};
use crate::types::{DeploymentId, ProjectName, StageId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("deployment not found: {0}")]
    DeploymentNotFound(String),

    #[error("stage record not found: {0}")]
    StageNotFound(StageId),

    #[error("no build cycle recorded for deployment {0}")]
    NoCycle(String),

    #[error("store persistence failed: {0}")]
    Persistence(String),
}

/// The aggregate root: one deployed stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub id: DeploymentId,
    pub name: ProjectName,
    pub status: DeploymentStatus,
    pub git: GitBinding,
    /// Last assigned build number; the next cycle gets this plus one.
    pub last_build_number: u32,
    pub last_build_at: Option<DateTime<Utc>>,
    pub last_duration: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One stage of one build cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub id: StageId,
    pub deployment: DeploymentId,
    pub build_number: u32,
    pub kind: StageKind,
    pub status: StageStatus,
    pub source_event: Option<SourceEvent>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Webhook payload captured when a cycle is triggered from source control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEvent {
    pub username: String,
    pub repository_url: String,
    pub branch: String,
    #[serde(default)]
    pub commit: Option<String>,
}

/// One Pull+Build+Run triple sharing a build number, stages addressed by
/// kind rather than by position in a query result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildCycle {
    pub build_number: u32,
    pub pull: StageRecord,
    pub build: StageRecord,
    pub run: StageRecord,
}

impl BuildCycle {
    pub fn stage(&self, kind: StageKind) -> &StageRecord {
        match kind {
            StageKind::Pull => &self.pull,
            StageKind::Build => &self.build,
            StageKind::Run => &self.run,
        }
    }

    pub fn stages(&self) -> [&StageRecord; 3] {
        [&self.pull, &self.build, &self.run]
    }
}

/// CRUD and ordering queries over deployments and their cycles.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_deployment(
        &self,
        name: &ProjectName,
        git: &GitBinding,
    ) -> Result<DeploymentRecord, StoreError>;

    async fn get_deployment(&self, id: DeploymentId) -> Result<DeploymentRecord, StoreError>;

    async fn find_deployment(
        &self,
        name: &ProjectName,
    ) -> Result<Option<DeploymentRecord>, StoreError>;

    async fn list_deployments(&self) -> Result<Vec<DeploymentRecord>, StoreError>;

    async fn update_git(&self, id: DeploymentId, git: &GitBinding) -> Result<(), StoreError>;

    async fn set_deployment_status(
        &self,
        id: DeploymentId,
        status: DeploymentStatus,
    ) -> Result<(), StoreError>;

    async fn touch_build_time(&self, id: DeploymentId) -> Result<(), StoreError>;

    async fn set_last_duration(&self, id: DeploymentId, duration: &str) -> Result<(), StoreError>;

    /// Atomically increment and return the deployment's build number.
    async fn next_build_number(&self, id: DeploymentId) -> Result<u32, StoreError>;

    /// Create the three stage records of a new cycle in one step.
    async fn create_cycle(
        &self,
        id: DeploymentId,
        build_number: u32,
        source_event: Option<&SourceEvent>,
    ) -> Result<BuildCycle, StoreError>;

    /// The cycle with the highest build number for a deployment.
    async fn latest_cycle(&self, id: DeploymentId) -> Result<BuildCycle, StoreError>;

    /// All cycles for a deployment, ascending by build number.
    async fn cycles(&self, id: DeploymentId) -> Result<Vec<BuildCycle>, StoreError>;

    async fn set_stage_status(&self, stage: StageId, status: StageStatus)
    -> Result<(), StoreError>;

    async fn get_stage(&self, stage: StageId) -> Result<StageRecord, StoreError>;

    /// Remove a deployment and all of its stage records.
    async fn delete_deployment(&self, id: DeploymentId) -> Result<(), StoreError>;
}
