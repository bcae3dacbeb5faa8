// ABOUTME: JSON-file-backed store for the CLI control process.
// ABOUTME: Whole state loaded on open, rewritten atomically after every mutation.

use super::memory::State;
use super::{BuildCycle, DeploymentRecord, SourceEvent, StageRecord, Store, StoreError};
use crate::config::GitBinding;
use crate::pipeline::{DeploymentStatus, StageStatus};
use crate::types::{DeploymentId, ProjectName, StageId};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::fs;
use std::path::PathBuf;

/// Single-writer store persisted to one JSON file under the data root.
/// Suitable for a single-host control process, not a concurrent database;
/// cross-process exclusion comes from the pipeline lock.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    state: RwLock<State>,
}

impl JsonStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| StoreError::Persistence(format!("read {}: {e}", path.display())))?;
            serde_json::from_str(&content)
                .map_err(|e| StoreError::Persistence(format!("parse {}: {e}", path.display())))?
        } else {
            State::default()
        };

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    /// Write the state out via a temp file so a crash never leaves a
    /// truncated store behind.
    fn save(&self, state: &State) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::Persistence(format!("create {}: {e}", parent.display())))?;
        }

        let json = serde_json::to_string_pretty(state)
            .map_err(|e| StoreError::Persistence(format!("encode store: {e}")))?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)
            .map_err(|e| StoreError::Persistence(format!("write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| StoreError::Persistence(format!("replace {}: {e}", self.path.display())))?;
        Ok(())
    }

    /// Run a mutation against the state and persist the result.
    fn mutate<T>(
        &self,
        op: impl FnOnce(&mut State) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut state = self.state.write();
        let value = op(&mut state)?;
        self.save(&state)?;
        Ok(value)
    }
}

#[async_trait]
impl Store for JsonStore {
    async fn create_deployment(
        &self,
        name: &ProjectName,
        git: &GitBinding,
    ) -> Result<DeploymentRecord, StoreError> {
        self.mutate(|state| Ok(state.create_deployment(name, git)))
    }

    async fn get_deployment(&self, id: DeploymentId) -> Result<DeploymentRecord, StoreError> {
        self.state.read().get_deployment(id)
    }

    async fn find_deployment(
        &self,
        name: &ProjectName,
    ) -> Result<Option<DeploymentRecord>, StoreError> {
        Ok(self.state.read().find_deployment(name))
    }

    async fn list_deployments(&self) -> Result<Vec<DeploymentRecord>, StoreError> {
        Ok(self.state.read().list_deployments())
    }

    async fn update_git(&self, id: DeploymentId, git: &GitBinding) -> Result<(), StoreError> {
        self.mutate(|state| state.update_git(id, git))
    }

    async fn set_deployment_status(
        &self,
        id: DeploymentId,
        status: DeploymentStatus,
    ) -> Result<(), StoreError> {
        self.mutate(|state| state.set_deployment_status(id, status))
    }

    async fn touch_build_time(&self, id: DeploymentId) -> Result<(), StoreError> {
        self.mutate(|state| state.touch_build_time(id))
    }

    async fn set_last_duration(&self, id: DeploymentId, duration: &str) -> Result<(), StoreError> {
        self.mutate(|state| state.set_last_duration(id, duration))
    }

    async fn next_build_number(&self, id: DeploymentId) -> Result<u32, StoreError> {
        self.mutate(|state| state.next_build_number(id))
    }

    async fn create_cycle(
        &self,
        id: DeploymentId,
        build_number: u32,
        source_event: Option<&SourceEvent>,
    ) -> Result<BuildCycle, StoreError> {
        self.mutate(|state| state.create_cycle(id, build_number, source_event))
    }

    async fn latest_cycle(&self, id: DeploymentId) -> Result<BuildCycle, StoreError> {
        self.state.read().latest_cycle(id)
    }

    async fn cycles(&self, id: DeploymentId) -> Result<Vec<BuildCycle>, StoreError> {
        self.state.read().cycles(id)
    }

    async fn set_stage_status(
        &self,
        stage: StageId,
        status: StageStatus,
    ) -> Result<(), StoreError> {
        self.mutate(|state| state.set_stage_status(stage, status))
    }

    async fn get_stage(&self, stage: StageId) -> Result<StageRecord, StoreError> {
        self.state.read().get_stage(stage)
    }

    async fn delete_deployment(&self, id: DeploymentId) -> Result<(), StoreError> {
        self.mutate(|state| state.delete_deployment(id))
    }
}
