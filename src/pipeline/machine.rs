// ABOUTME: The deployment pipeline: build-number assignment and the Pull/Build/Run lifecycle.
// ABOUTME: Stage and deployment statuses are committed before any error is re-raised.

use super::error::PipelineError;
use super::status::{DeploymentStatus, StageKind, StageStatus};
use crate::adapter::EngineAdapter;
use crate::artifact::Snapshot;
use crate::catalog::Catalog;
use crate::config::StackConfig;
use crate::error::Result as CrateResult;
use crate::exec::Executor;
use crate::layout::Layout;
use crate::proxy;
use crate::scm;
use crate::store::{BuildCycle, DeploymentRecord, SourceEvent, Store};
use crate::translate::Translator;
use crate::types::{DeploymentId, ProjectName};
use std::fs;

/// Build number recorded for setup phases (clone, network, stop, remove)
/// that run outside any build cycle.
const SETUP_BUILD_NUMBER: u32 = 0;

/// Drives deployments through their build cycles.
///
/// Not safe for concurrent invocation against the same deployment; callers
/// hold a [`super::PipelineLock`] for the duration of a cycle.
pub struct Pipeline<S, E> {
    store: S,
    executor: E,
    layout: Layout,
    catalog: Catalog,
    engine: String,
}

impl<S: Store, E: Executor> Pipeline<S, E> {
    pub fn new(store: S, executor: E, layout: Layout, catalog: Catalog) -> Self {
        Self {
            store,
            executor,
            layout,
            catalog,
            engine: crate::adapter::DEFAULT_ENGINE.to_string(),
        }
    }

    pub fn with_engine(mut self, engine: &str) -> Self {
        self.engine = engine.to_string();
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn adapter(&self, project: &ProjectName) -> EngineAdapter {
        EngineAdapter::with_engine(&self.engine, project.clone(), self.layout.repo_dir(project))
    }

    // ------------------------------------------------------------------
    // Configuration submission
    // ------------------------------------------------------------------

    /// Submit a stack configuration: translate, upsert the deployment,
    /// rewrite the snapshot wholesale, refresh the source tree, and create
    /// the deployment network.
    ///
    /// Translation runs first so configuration errors abort before any
    /// filesystem mutation.
    pub async fn apply(&self, config: &StackConfig) -> CrateResult<DeploymentRecord> {
        let translator = Translator::new(&self.catalog);
        let project = &config.project;

        let mut builds = translator.build_specs(&config.builds)?;
        let databases = translator.db_specs(project, &config.databases, &self.layout)?;

        let proxy_spec = match &config.proxy {
            Some(input) => translator.proxy_spec(input)?,
            None => None,
        };
        let mut nginx_target = None;
        if let Some(spec) = &proxy_spec {
            nginx_target = Some(translator.apply_proxy_exposure(&mut builds, spec)?);
        }

        let dockerfiles = translator.dockerfile_plans(&builds)?;

        // All lookups and validations passed; start mutating.
        let record = match self.store.find_deployment(project).await? {
            Some(existing) => {
                self.store.update_git(existing.id, &config.git).await?;
                tracing::info!(%project, "configuration updated");
                existing
            }
            None => {
                let record = self.store.create_deployment(project, &config.git).await?;
                tracing::info!(%project, "deployment created");
                record
            }
        };

        let project_dir = self.layout.project_dir(project);
        let log_dir = self.layout.log_dir(project);
        fs::create_dir_all(&project_dir)?;
        fs::create_dir_all(&log_dir)?;

        Snapshot {
            builds: builds.clone(),
            databases,
            proxy: proxy_spec.clone(),
        }
        .write(&self.layout.config_dir(project))?;

        // Fresh checkout on every submission; the repo is derived state.
        let repo_dir = self.layout.repo_dir(project);
        if repo_dir.exists() {
            fs::remove_dir_all(&repo_dir)?;
        }
        let clone = scm::clone_command(
            &config.git.repository_url,
            &config.git.branch,
            config.git.access_token.as_deref(),
            crate::layout::REPO_DIR,
        );
        self.executor
            .execute(&project_dir, &log_dir, "Clone", SETUP_BUILD_NUMBER, &[clone])
            .await?;

        for plan in &dockerfiles {
            let dir = repo_dir.join(&plan.source_dir);
            fs::create_dir_all(&dir)?;
            fs::write(dir.join("Dockerfile"), &plan.content)?;
        }

        if let (Some(spec), Some(target)) = (&proxy_spec, &nginx_target) {
            let dir = repo_dir.join(target);
            fs::create_dir_all(&dir)?;
            fs::write(dir.join(proxy::CONFIG_FILENAME), proxy::render(spec))?;
        }

        // The network usually exists already on re-submission; the engine's
        // complaint is not a configuration failure.
        let network = self.adapter(project).create_network_command();
        if let Err(e) = self
            .executor
            .execute(&project_dir, &log_dir, "Network", SETUP_BUILD_NUMBER, &[network])
            .await
        {
            tracing::warn!(%project, error = %e, "network create skipped");
        }

        Ok(record)
    }

    // ------------------------------------------------------------------
    // Build cycle stages
    // ------------------------------------------------------------------

    /// Open a new build cycle: assign the next build number and create its
    /// three stage records (Pull processing, Build and Run waiting).
    pub async fn start_cycle(
        &self,
        id: DeploymentId,
        source_event: Option<&SourceEvent>,
    ) -> Result<BuildCycle, PipelineError> {
        let deployment = self.store.get_deployment(id).await?;

        let build_number = self.store.next_build_number(id).await?;
        let cycle = self.store.create_cycle(id, build_number, source_event).await?;

        self.store
            .set_deployment_status(id, DeploymentStatus::Processing)
            .await?;
        self.store.touch_build_time(id).await?;

        tracing::info!(project = %deployment.name, build_number, "build cycle started");
        Ok(cycle)
    }

    /// Pull stage: update the working copy from source control. The first
    /// cycle skips the pull since the clone performed at configuration time
    /// is already current.
    pub async fn retrieve_source(&self, id: DeploymentId) -> Result<(), PipelineError> {
        let deployment = self.store.get_deployment(id).await?;
        let cycle = self.store.latest_cycle(id).await?;

        let result = if cycle.build_number > 1 {
            let commands = vec![scm::pull_command(&deployment.git.branch)];
            self.executor
                .execute(
                    &self.layout.repo_dir(&deployment.name),
                    &self.layout.log_dir(&deployment.name),
                    StageKind::Pull.phase(),
                    cycle.build_number,
                    &commands,
                )
                .await
        } else {
            tracing::debug!(project = %deployment.name, "first cycle, clone is current");
            Ok(())
        };

        match result {
            Ok(()) => {
                self.store
                    .set_stage_status(cycle.pull.id, StageStatus::Done)
                    .await?;
                self.store
                    .set_stage_status(cycle.build.id, StageStatus::Processing)
                    .await?;
                tracing::info!(project = %deployment.name, build_number = cycle.build_number, "pull done");
                Ok(())
            }
            Err(e) => {
                self.fail_stage(id, cycle.pull.id, &deployment.name, StageKind::Pull)
                    .await;
                Err(e.into())
            }
        }
    }

    /// Build stage: build one image per configured build target.
    pub async fn build_artifacts(&self, id: DeploymentId) -> Result<(), PipelineError> {
        let deployment = self.store.get_deployment(id).await?;
        let cycle = self.store.latest_cycle(id).await?;

        let snapshot = Snapshot::read(&self.layout.config_dir(&deployment.name))?;
        let commands = self.adapter(&deployment.name).build_commands(&snapshot.builds);

        let result = self
            .executor
            .execute(
                &self.layout.project_dir(&deployment.name),
                &self.layout.log_dir(&deployment.name),
                StageKind::Build.phase(),
                cycle.build_number,
                &commands,
            )
            .await;

        match result {
            Ok(()) => {
                self.store
                    .set_stage_status(cycle.build.id, StageStatus::Done)
                    .await?;
                self.store
                    .set_stage_status(cycle.run.id, StageStatus::Processing)
                    .await?;
                tracing::info!(project = %deployment.name, build_number = cycle.build_number, "build done");
                Ok(())
            }
            Err(e) => {
                self.fail_stage(id, cycle.build.id, &deployment.name, StageKind::Build)
                    .await;
                Err(e.into())
            }
        }
    }

    /// Run stage: tear down the previous generation (except on the first
    /// cycle), then start databases before applications.
    pub async fn run_containers(&self, id: DeploymentId) -> Result<(), PipelineError> {
        let deployment = self.store.get_deployment(id).await?;
        let cycle = self.store.latest_cycle(id).await?;

        let snapshot = Snapshot::read(&self.layout.config_dir(&deployment.name))?;

        let result = self
            .run_commands(&deployment, &snapshot, cycle.build_number)
            .await;

        match result {
            Ok(()) => {
                self.store
                    .set_stage_status(cycle.run.id, StageStatus::Done)
                    .await?;
                tracing::info!(project = %deployment.name, build_number = cycle.build_number, "run done");
                Ok(())
            }
            Err(e) => {
                self.fail_stage(id, cycle.run.id, &deployment.name, StageKind::Run)
                    .await;
                Err(e.into())
            }
        }
    }

    async fn run_commands(
        &self,
        deployment: &DeploymentRecord,
        snapshot: &Snapshot,
        build_number: u32,
    ) -> Result<(), crate::exec::ExecError> {
        let adapter = self.adapter(&deployment.name);
        let project_dir = self.layout.project_dir(&deployment.name);
        let log_dir = self.layout.log_dir(&deployment.name);

        // Nothing exists yet on the first cycle; skip removal.
        if build_number != 1 {
            if !snapshot.databases.is_empty() {
                self.executor
                    .execute(
                        &project_dir,
                        &log_dir,
                        "Remove",
                        build_number,
                        &adapter.remove_db_commands(&snapshot.databases),
                    )
                    .await?;
            }
            if !snapshot.builds.is_empty() {
                self.executor
                    .execute(
                        &project_dir,
                        &log_dir,
                        "Remove",
                        build_number,
                        &adapter.remove_app_commands(&snapshot.builds),
                    )
                    .await?;
            }
        }

        // Databases first: applications may need them reachable at start.
        let mut commands = adapter.run_db_commands(&snapshot.databases);
        commands.extend(adapter.run_app_commands(&snapshot.builds));

        self.executor
            .execute(
                &project_dir,
                &log_dir,
                StageKind::Run.phase(),
                build_number,
                &commands,
            )
            .await
    }

    /// Terminal success marker for the whole cycle.
    pub async fn mark_done(&self, id: DeploymentId, duration: &str) -> Result<(), PipelineError> {
        self.store
            .set_deployment_status(id, DeploymentStatus::Done)
            .await?;
        self.store.set_last_duration(id, duration).await?;
        Ok(())
    }

    /// Record a stage failure and propagate it to the deployment. Sibling
    /// stages are left untouched. Best effort: a store failure here is
    /// logged, not raised, so the original error reaches the caller.
    async fn fail_stage(
        &self,
        id: DeploymentId,
        stage: crate::types::StageId,
        project: &ProjectName,
        kind: StageKind,
    ) {
        tracing::error!(%project, stage = %kind, "stage failed");
        if let Err(e) = self.store.set_stage_status(stage, StageStatus::Failed).await {
            tracing::error!(%project, error = %e, "could not record stage failure");
        }
        if let Err(e) = self
            .store
            .set_deployment_status(id, DeploymentStatus::Failed)
            .await
        {
            tracing::error!(%project, error = %e, "could not record deployment failure");
        }
    }

    // ------------------------------------------------------------------
    // Administrative operations
    // ------------------------------------------------------------------

    /// Stop every container of the deployment: database group, then
    /// application group. Resets the deployment to Waiting.
    pub async fn stop_containers(&self, id: DeploymentId) -> Result<(), PipelineError> {
        let deployment = self.store.get_deployment(id).await?;
        let snapshot = Snapshot::read(&self.layout.config_dir(&deployment.name))?;

        let commands = self
            .adapter(&deployment.name)
            .stop_commands(&snapshot.databases, &snapshot.builds);
        if !commands.is_empty() {
            self.executor
                .execute(
                    &self.layout.project_dir(&deployment.name),
                    &self.layout.log_dir(&deployment.name),
                    "Stop",
                    SETUP_BUILD_NUMBER,
                    &commands,
                )
                .await?;
        }

        self.store
            .set_deployment_status(id, DeploymentStatus::Waiting)
            .await?;
        Ok(())
    }

    /// Remove every container of the deployment: database group, then
    /// application group.
    pub async fn remove_containers(&self, id: DeploymentId) -> Result<(), PipelineError> {
        let deployment = self.store.get_deployment(id).await?;
        let snapshot = Snapshot::read(&self.layout.config_dir(&deployment.name))?;

        let commands = self
            .adapter(&deployment.name)
            .remove_commands(&snapshot.databases, &snapshot.builds);
        if !commands.is_empty() {
            self.executor
                .execute(
                    &self.layout.project_dir(&deployment.name),
                    &self.layout.log_dir(&deployment.name),
                    "Remove",
                    SETUP_BUILD_NUMBER,
                    &commands,
                )
                .await?;
        }
        Ok(())
    }

    /// Delete a deployment: purge its project directory and volumes, then
    /// cascade the store records.
    pub async fn delete_deployment(&self, id: DeploymentId) -> Result<(), PipelineError> {
        let deployment = self.store.get_deployment(id).await?;

        let project_dir = self.layout.project_dir(&deployment.name);
        if project_dir.exists() {
            fs::remove_dir_all(&project_dir).map_err(|e| PipelineError::Snapshot {
                source: crate::artifact::SnapshotError::Io(e),
            })?;
        }
        let volume_dir = self.layout.volume_dir(&deployment.name);
        if volume_dir.exists() {
            fs::remove_dir_all(&volume_dir).map_err(|e| PipelineError::Snapshot {
                source: crate::artifact::SnapshotError::Io(e),
            })?;
        }

        self.store.delete_deployment(id).await?;
        tracing::info!(project = %deployment.name, "deployment deleted");
        Ok(())
    }
}
