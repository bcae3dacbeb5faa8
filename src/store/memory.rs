// ABOUTME: In-memory store implementation plus the shared state operations.
// ABOUTME: State is guarded by a parking_lot RwLock; ids are monotonic counters.

use super::{BuildCycle, DeploymentRecord, SourceEvent, StageRecord, Store, StoreError};
use crate::config::GitBinding;
use crate::pipeline::{DeploymentStatus, StageKind, StageStatus};
use crate::types::{DeploymentId, ProjectName, StageId};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The whole store state. Shared between the in-memory store and the
/// JSON-file store, which persists it verbatim.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct State {
    next_deployment_id: u64,
    next_stage_id: u64,
    deployments: BTreeMap<u64, DeploymentRecord>,
    stages: BTreeMap<u64, StageRecord>,
}

impl State {
    fn allocate_deployment_id(&mut self) -> DeploymentId {
        self.next_deployment_id += 1;
        DeploymentId::new(self.next_deployment_id)
    }

    fn allocate_stage_id(&mut self) -> StageId {
        self.next_stage_id += 1;
        StageId::new(self.next_stage_id)
    }

    fn deployment_mut(&mut self, id: DeploymentId) -> Result<&mut DeploymentRecord, StoreError> {
        self.deployments
            .get_mut(&id.value())
            .ok_or_else(|| StoreError::DeploymentNotFound(id.to_string()))
    }

    pub(crate) fn create_deployment(
        &mut self,
        name: &ProjectName,
        git: &GitBinding,
    ) -> DeploymentRecord {
        let record = DeploymentRecord {
            id: self.allocate_deployment_id(),
            name: name.clone(),
            status: DeploymentStatus::Waiting,
            git: git.clone(),
            last_build_number: 0,
            last_build_at: None,
            last_duration: None,
            created_at: Utc::now(),
        };
        self.deployments.insert(record.id.value(), record.clone());
        record
    }

    pub(crate) fn get_deployment(
        &self,
        id: DeploymentId,
    ) -> Result<DeploymentRecord, StoreError> {
        self.deployments
            .get(&id.value())
            .cloned()
            .ok_or_else(|| StoreError::DeploymentNotFound(id.to_string()))
    }

    pub(crate) fn find_deployment(&self, name: &ProjectName) -> Option<DeploymentRecord> {
        self.deployments
            .values()
            .find(|d| &d.name == name)
            .cloned()
    }

    pub(crate) fn list_deployments(&self) -> Vec<DeploymentRecord> {
        self.deployments.values().cloned().collect()
    }

    pub(crate) fn update_git(
        &mut self,
        id: DeploymentId,
        git: &GitBinding,
    ) -> Result<(), StoreError> {
        self.deployment_mut(id)?.git = git.clone();
        Ok(())
    }

    pub(crate) fn set_deployment_status(
        &mut self,
        id: DeploymentId,
        status: DeploymentStatus,
    ) -> Result<(), StoreError> {
        self.deployment_mut(id)?.status = status;
        Ok(())
    }

    pub(crate) fn touch_build_time(&mut self, id: DeploymentId) -> Result<(), StoreError> {
        self.deployment_mut(id)?.last_build_at = Some(Utc::now());
        Ok(())
    }

    pub(crate) fn set_last_duration(
        &mut self,
        id: DeploymentId,
        duration: &str,
    ) -> Result<(), StoreError> {
        self.deployment_mut(id)?.last_duration = Some(duration.to_string());
        Ok(())
    }

    pub(crate) fn next_build_number(&mut self, id: DeploymentId) -> Result<u32, StoreError> {
        let deployment = self.deployment_mut(id)?;
        deployment.last_build_number += 1;
        Ok(deployment.last_build_number)
    }

    pub(crate) fn create_cycle(
        &mut self,
        id: DeploymentId,
        build_number: u32,
        source_event: Option<&SourceEvent>,
    ) -> Result<BuildCycle, StoreError> {
        // Validate existence before touching the stage table.
        self.get_deployment(id)?;

        let now = Utc::now();
        let mut make_stage = |kind: StageKind, status: StageStatus| {
            let record = StageRecord {
                id: self.allocate_stage_id(),
                deployment: id,
                build_number,
                kind,
                status,
                source_event: source_event.cloned(),
                created_at: now,
                updated_at: now,
            };
            self.stages.insert(record.id.value(), record.clone());
            record
        };

        Ok(BuildCycle {
            build_number,
            pull: make_stage(StageKind::Pull, StageStatus::Processing),
            build: make_stage(StageKind::Build, StageStatus::Waiting),
            run: make_stage(StageKind::Run, StageStatus::Waiting),
        })
    }

    pub(crate) fn latest_cycle(&self, id: DeploymentId) -> Result<BuildCycle, StoreError> {
        let name = self.get_deployment(id)?.name;
        let mut cycles = self.cycles(id)?;
        cycles
            .pop()
            .ok_or_else(|| StoreError::NoCycle(name.to_string()))
    }

    pub(crate) fn cycles(&self, id: DeploymentId) -> Result<Vec<BuildCycle>, StoreError> {
        self.get_deployment(id)?;

        let mut grouped: BTreeMap<u32, Vec<StageRecord>> = BTreeMap::new();
        for stage in self.stages.values().filter(|s| s.deployment == id) {
            grouped.entry(stage.build_number).or_default().push(stage.clone());
        }

        let mut cycles = Vec::with_capacity(grouped.len());
        for (build_number, stages) in grouped {
            match cycle_from_group(build_number, &stages) {
                Some(cycle) => cycles.push(cycle),
                None => {
                    return Err(StoreError::Persistence(format!(
                        "incomplete stage triple for build {build_number}"
                    )));
                }
            }
        }
        Ok(cycles)
    }

    pub(crate) fn set_stage_status(
        &mut self,
        stage: StageId,
        status: StageStatus,
    ) -> Result<(), StoreError> {
        let record = self
            .stages
            .get_mut(&stage.value())
            .ok_or(StoreError::StageNotFound(stage))?;
        record.status = status;
        record.updated_at = Utc::now();
        Ok(())
    }

    pub(crate) fn get_stage(&self, stage: StageId) -> Result<StageRecord, StoreError> {
        self.stages
            .get(&stage.value())
            .cloned()
            .ok_or(StoreError::StageNotFound(stage))
    }

    pub(crate) fn delete_deployment(&mut self, id: DeploymentId) -> Result<(), StoreError> {
        self.deployments
            .remove(&id.value())
            .ok_or_else(|| StoreError::DeploymentNotFound(id.to_string()))?;
        self.stages.retain(|_, stage| stage.deployment != id);
        Ok(())
    }
}

fn cycle_from_group(build_number: u32, stages: &[StageRecord]) -> Option<BuildCycle> {
    let find = |kind: StageKind| stages.iter().find(|s| s.kind == kind).cloned();
    Some(BuildCycle {
        build_number,
        pull: find(StageKind::Pull)?,
        build: find(StageKind::Build)?,
        run: find(StageKind::Run)?,
    })
}

/// Store for tests and embedding; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_deployment(
        &self,
        name: &ProjectName,
        git: &GitBinding,
    ) -> Result<DeploymentRecord, StoreError> {
        Ok(self.state.write().create_deployment(name, git))
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
        self.state.write().update_git(id, git)
    }

    async fn set_deployment_status(
        &self,
        id: DeploymentId,
        status: DeploymentStatus,
    ) -> Result<(), StoreError> {
        self.state.write().set_deployment_status(id, status)
    }

    async fn touch_build_time(&self, id: DeploymentId) -> Result<(), StoreError> {
        self.state.write().touch_build_time(id)
    }

    async fn set_last_duration(&self, id: DeploymentId, duration: &str) -> Result<(), StoreError> {
        self.state.write().set_last_duration(id, duration)
    }

    async fn next_build_number(&self, id: DeploymentId) -> Result<u32, StoreError> {
        self.state.write().next_build_number(id)
    }

    async fn create_cycle(
        &self,
        id: DeploymentId,
        build_number: u32,
        source_event: Option<&SourceEvent>,
    ) -> Result<BuildCycle, StoreError> {
        self.state.write().create_cycle(id, build_number, source_event)
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
        self.state.write().set_stage_status(stage, status)
    }

    async fn get_stage(&self, stage: StageId) -> Result<StageRecord, StoreError> {
        self.state.read().get_stage(stage)
    }

    async fn delete_deployment(&self, id: DeploymentId) -> Result<(), StoreError> {
        self.state.write().delete_deployment(id)
    }
}
