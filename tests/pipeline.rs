// ABOUTME: Tests for the deployment pipeline state machine.
// ABOUTME: Covers cycle creation, stage ordering, failure semantics, and apply.

mod support;

use dockhand::artifact::Snapshot;
use dockhand::pipeline::{DeploymentStatus, PipelineError, PipelineErrorKind, StageKind, StageStatus};
use dockhand::store::Store;
use dockhand::types::DeploymentId;
use proptest::prelude::*;
use support::{applied_pipeline, proxied_config, sample_config};

// ---------------------------------------------------------------------
// Cycle creation
// ---------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    /// Build numbers for N fresh cycles are exactly 1..=N.
    #[test]
    fn build_numbers_are_sequential(n in 1u32..8) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let (pipeline, _executor, record) =
                applied_pipeline(dir.path(), &sample_config("shop")).await;

            for expected in 1..=n {
                let cycle = pipeline.start_cycle(record.id, None).await.unwrap();
                prop_assert_eq!(cycle.build_number, expected);
            }

            let cycles = pipeline.store().cycles(record.id).await.unwrap();
            let numbers: Vec<u32> = cycles.iter().map(|c| c.build_number).collect();
            prop_assert_eq!(numbers, (1..=n).collect::<Vec<u32>>());
            Ok(())
        })?;
    }
}

#[tokio::test]
async fn start_cycle_creates_the_stage_triple() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _executor, record) = applied_pipeline(dir.path(), &sample_config("shop")).await;

    let cycle = pipeline.start_cycle(record.id, None).await.unwrap();

    assert_eq!(cycle.pull.kind, StageKind::Pull);
    assert_eq!(cycle.build.kind, StageKind::Build);
    assert_eq!(cycle.run.kind, StageKind::Run);
    assert_eq!(cycle.pull.status, StageStatus::Processing);
    assert_eq!(cycle.build.status, StageStatus::Waiting);
    assert_eq!(cycle.run.status, StageStatus::Waiting);

    let deployment = pipeline.store().get_deployment(record.id).await.unwrap();
    assert_eq!(deployment.status, DeploymentStatus::Processing);
    assert!(deployment.last_build_at.is_some());
}

#[tokio::test]
async fn source_events_are_snapshotted_on_each_stage() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _executor, record) = applied_pipeline(dir.path(), &sample_config("shop")).await;

    let event = dockhand::store::SourceEvent {
        username: "octocat".into(),
        repository_url: "https://git.example.com/acme/shop.git".into(),
        branch: "main".into(),
        commit: Some("abc123".into()),
    };

    let cycle = pipeline.start_cycle(record.id, Some(&event)).await.unwrap();
    for stage in cycle.stages() {
        assert_eq!(stage.source_event.as_ref(), Some(&event));
    }
}

#[tokio::test]
async fn start_cycle_on_missing_deployment_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _executor, _record) = applied_pipeline(dir.path(), &sample_config("shop")).await;

    let err = pipeline
        .start_cycle(DeploymentId::new(999), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), PipelineErrorKind::NotFound);
}

// ---------------------------------------------------------------------
// Pull stage
// ---------------------------------------------------------------------

#[tokio::test]
async fn first_cycle_skips_the_pull_command() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, executor, record) = applied_pipeline(dir.path(), &sample_config("shop")).await;

    pipeline.start_cycle(record.id, None).await.unwrap();
    pipeline.retrieve_source(record.id).await.unwrap();

    assert!(executor.calls().is_empty());

    let cycle = pipeline.store().latest_cycle(record.id).await.unwrap();
    assert_eq!(cycle.pull.status, StageStatus::Done);
    assert_eq!(cycle.build.status, StageStatus::Processing);
}

#[tokio::test]
async fn later_cycles_pull_the_bound_branch() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, executor, record) = applied_pipeline(dir.path(), &sample_config("shop")).await;

    run_full_cycle(&pipeline, record.id).await;
    executor.clear();

    pipeline.start_cycle(record.id, None).await.unwrap();
    pipeline.retrieve_source(record.id).await.unwrap();

    let calls = executor.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].phase, "Pull");
    assert_eq!(calls[0].build_number, 2);
    assert_eq!(calls[0].commands, vec!["git pull origin main".to_string()]);
}

#[tokio::test]
async fn failed_pull_fails_stage_and_deployment() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, executor, record) = applied_pipeline(dir.path(), &sample_config("shop")).await;

    run_full_cycle(&pipeline, record.id).await;
    executor.fail_on("Pull");

    pipeline.start_cycle(record.id, None).await.unwrap();
    let err = pipeline.retrieve_source(record.id).await.unwrap_err();
    assert!(matches!(err, PipelineError::Execution { .. }));

    let cycle = pipeline.store().latest_cycle(record.id).await.unwrap();
    assert_eq!(cycle.pull.status, StageStatus::Failed);
    // Siblings are left untouched, not cancelled.
    assert_eq!(cycle.build.status, StageStatus::Waiting);
    assert_eq!(cycle.run.status, StageStatus::Waiting);

    let deployment = pipeline.store().get_deployment(record.id).await.unwrap();
    assert_eq!(deployment.status, DeploymentStatus::Failed);
}

// ---------------------------------------------------------------------
// Build stage
// ---------------------------------------------------------------------

#[tokio::test]
async fn build_issues_one_command_per_target_and_advances_run() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, executor, record) = applied_pipeline(dir.path(), &sample_config("shop")).await;

    pipeline.start_cycle(record.id, None).await.unwrap();
    pipeline.retrieve_source(record.id).await.unwrap();
    pipeline.build_artifacts(record.id).await.unwrap();

    let calls = executor.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].phase, "Build");
    assert_eq!(calls[0].commands.len(), 1);
    assert!(calls[0].commands[0].starts_with("docker build -t shop-api"));

    let cycle = pipeline.store().latest_cycle(record.id).await.unwrap();
    assert_eq!(cycle.build.status, StageStatus::Done);
    assert_eq!(cycle.run.status, StageStatus::Processing);
}

#[tokio::test]
async fn failed_build_leaves_run_waiting() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, executor, record) = applied_pipeline(dir.path(), &sample_config("shop")).await;

    executor.fail_on("Build");
    pipeline.start_cycle(record.id, None).await.unwrap();
    pipeline.retrieve_source(record.id).await.unwrap();

    let err = pipeline.build_artifacts(record.id).await.unwrap_err();
    assert_eq!(err.kind(), PipelineErrorKind::Execution);

    let cycle = pipeline.store().latest_cycle(record.id).await.unwrap();
    assert_eq!(cycle.pull.status, StageStatus::Done);
    assert_eq!(cycle.build.status, StageStatus::Failed);
    assert_eq!(cycle.run.status, StageStatus::Waiting);

    let deployment = pipeline.store().get_deployment(record.id).await.unwrap();
    assert_eq!(deployment.status, DeploymentStatus::Failed);
}

// ---------------------------------------------------------------------
// Run stage
// ---------------------------------------------------------------------

#[tokio::test]
async fn first_cycle_run_issues_no_removals() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, executor, record) = applied_pipeline(dir.path(), &sample_config("shop")).await;

    run_full_cycle(&pipeline, record.id).await;

    let phases = executor.phases();
    assert!(!phases.contains(&"Remove".to_string()));
    assert_eq!(phases.last().map(String::as_str), Some("Run"));
}

#[tokio::test]
async fn run_starts_databases_before_applications() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, executor, record) = applied_pipeline(dir.path(), &sample_config("shop")).await;

    run_full_cycle(&pipeline, record.id).await;

    let calls = executor.calls();
    let run_call = calls.iter().find(|c| c.phase == "Run").unwrap();
    assert_eq!(run_call.commands.len(), 2);
    assert!(run_call.commands[0].contains("--name shop-maindb"));
    assert!(run_call.commands[0].ends_with("mysql:8.0"));
    assert!(run_call.commands[1].contains("--name shop-api"));
}

#[tokio::test]
async fn later_cycles_remove_databases_then_applications_before_running() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, executor, record) = applied_pipeline(dir.path(), &sample_config("shop")).await;

    run_full_cycle(&pipeline, record.id).await;
    executor.clear();
    run_full_cycle(&pipeline, record.id).await;

    let calls = executor.calls();
    let phases: Vec<&str> = calls.iter().map(|c| c.phase.as_str()).collect();
    assert_eq!(phases, vec!["Pull", "Build", "Remove", "Remove", "Run"]);

    let removes: Vec<_> = calls.iter().filter(|c| c.phase == "Remove").collect();
    assert_eq!(removes[0].commands, vec!["docker rm -f shop-maindb"]);
    assert_eq!(removes[1].commands, vec!["docker rm -f shop-api"]);
}

#[tokio::test]
async fn failed_run_fails_stage_and_deployment() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, executor, record) = applied_pipeline(dir.path(), &sample_config("shop")).await;

    executor.fail_on("Run");
    pipeline.start_cycle(record.id, None).await.unwrap();
    pipeline.retrieve_source(record.id).await.unwrap();
    pipeline.build_artifacts(record.id).await.unwrap();
    assert!(pipeline.run_containers(record.id).await.is_err());

    let cycle = pipeline.store().latest_cycle(record.id).await.unwrap();
    assert_eq!(cycle.run.status, StageStatus::Failed);
    let deployment = pipeline.store().get_deployment(record.id).await.unwrap();
    assert_eq!(deployment.status, DeploymentStatus::Failed);
}

// ---------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------

#[tokio::test]
async fn mark_done_records_status_and_duration() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _executor, record) = applied_pipeline(dir.path(), &sample_config("shop")).await;

    run_full_cycle(&pipeline, record.id).await;
    pipeline.mark_done(record.id, "1m 23s").await.unwrap();

    let deployment = pipeline.store().get_deployment(record.id).await.unwrap();
    assert_eq!(deployment.status, DeploymentStatus::Done);
    assert_eq!(deployment.last_duration.as_deref(), Some("1m 23s"));
}

// ---------------------------------------------------------------------
// Configuration submission
// ---------------------------------------------------------------------

#[tokio::test]
async fn apply_writes_snapshot_with_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _executor, record) = applied_pipeline(dir.path(), &sample_config("shop")).await;

    let config_dir = pipeline.layout().config_dir(&record.name);
    let snapshot = Snapshot::read(&config_dir).unwrap();

    assert_eq!(snapshot.builds.len(), 1);
    assert_eq!(snapshot.databases.len(), 1);
    assert!(snapshot.proxy.is_none());

    let manifest = snapshot.manifest();
    assert!(manifest.build && manifest.db && !manifest.proxy);
}

#[tokio::test]
async fn apply_clones_and_creates_the_network() {
    let dir = tempfile::tempdir().unwrap();

    let executor = support::RecordingExecutor::new();
    let pipeline = dockhand::pipeline::Pipeline::new(
        dockhand::store::MemoryStore::new(),
        executor.clone(),
        dockhand::layout::Layout::new(dir.path()),
        dockhand::catalog::Catalog::builtin(),
    );
    pipeline.apply(&sample_config("shop")).await.unwrap();

    let calls = executor.calls();
    let phases: Vec<&str> = calls.iter().map(|c| c.phase.as_str()).collect();
    assert_eq!(phases, vec!["Clone", "Network"]);
    assert_eq!(calls[0].build_number, 0);
    assert!(calls[0].commands[0].starts_with("git clone -b main"));
    assert_eq!(calls[1].commands, vec!["docker network create shop"]);
}

#[tokio::test]
async fn engine_override_flows_into_generated_commands() {
    let dir = tempfile::tempdir().unwrap();

    let executor = support::RecordingExecutor::new();
    let pipeline = dockhand::pipeline::Pipeline::new(
        dockhand::store::MemoryStore::new(),
        executor.clone(),
        dockhand::layout::Layout::new(dir.path()),
        dockhand::catalog::Catalog::builtin(),
    )
    .with_engine("podman");
    pipeline.apply(&sample_config("shop")).await.unwrap();

    let calls = executor.calls();
    assert_eq!(calls[1].commands, vec!["podman network create shop"]);
}

#[tokio::test]
async fn apply_validation_fails_before_any_mutation() {
    let dir = tempfile::tempdir().unwrap();

    let executor = support::RecordingExecutor::new();
    let layout = dockhand::layout::Layout::new(dir.path());
    let store = dockhand::store::MemoryStore::new();
    let pipeline = dockhand::pipeline::Pipeline::new(
        store,
        executor.clone(),
        layout,
        dockhand::catalog::Catalog::builtin(),
    );

    // Proxy configured but no build target flagged as exposed.
    let mut config = proxied_config("shop");
    for build in &mut config.builds {
        build.proxy_exposed = false;
    }

    let err = pipeline.apply(&config).await.unwrap_err();
    assert!(matches!(err, dockhand::error::Error::Validation(_)));

    // Nothing was created: no record, no files, no commands.
    let name = dockhand::types::ProjectName::new("shop").unwrap();
    assert!(
        pipeline
            .store()
            .find_deployment(&name)
            .await
            .unwrap()
            .is_none()
    );
    assert!(!pipeline.layout().project_dir(&name).exists());
    assert!(executor.calls().is_empty());
}

#[tokio::test]
async fn apply_with_proxy_writes_nginx_conf_and_rewrites_the_port() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _executor, record) =
        applied_pipeline(dir.path(), &proxied_config("shop")).await;

    let repo = pipeline.layout().repo_dir(&record.name);
    let conf = std::fs::read_to_string(repo.join("frontend/nginx.conf")).unwrap();
    assert!(conf.contains("server_name shop.example.com;"));

    // Dockerfiles rendered next to the sources.
    assert!(repo.join("frontend/Dockerfile").exists());
    assert!(repo.join("backend/Dockerfile").exists());

    let snapshot = Snapshot::read(&pipeline.layout().config_dir(&record.name)).unwrap();
    let web = snapshot.builds.iter().find(|b| b.name == "web").unwrap();
    let publish = web
        .properties
        .iter()
        .find(|p| p.kind == dockhand::types::PropertyKind::Publish)
        .unwrap();
    assert_eq!(publish.container, "80");
}

#[tokio::test]
async fn reapply_replaces_the_snapshot_wholesale() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _executor, record) = applied_pipeline(dir.path(), &sample_config("shop")).await;

    // Resubmit without any databases.
    let mut config = sample_config("shop");
    config.databases.clear();
    let reapplied = pipeline.apply(&config).await.unwrap();
    assert_eq!(reapplied.id, record.id);

    let snapshot = Snapshot::read(&pipeline.layout().config_dir(&record.name)).unwrap();
    assert!(snapshot.databases.is_empty());
    assert_eq!(snapshot.builds.len(), 1);
}

// ---------------------------------------------------------------------
// Administrative operations
// ---------------------------------------------------------------------

#[tokio::test]
async fn stop_orders_databases_first_and_resets_status() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, executor, record) = applied_pipeline(dir.path(), &sample_config("shop")).await;

    run_full_cycle(&pipeline, record.id).await;
    executor.clear();

    pipeline.stop_containers(record.id).await.unwrap();

    let calls = executor.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].phase, "Stop");
    assert_eq!(
        calls[0].commands,
        vec!["docker stop shop-maindb", "docker stop shop-api"]
    );

    let deployment = pipeline.store().get_deployment(record.id).await.unwrap();
    assert_eq!(deployment.status, DeploymentStatus::Waiting);
}

#[tokio::test]
async fn delete_purges_files_and_store_records() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _executor, record) = applied_pipeline(dir.path(), &sample_config("shop")).await;

    let project_dir = pipeline.layout().project_dir(&record.name);
    assert!(project_dir.exists());

    pipeline.delete_deployment(record.id).await.unwrap();

    assert!(!project_dir.exists());
    let err = pipeline.store().get_deployment(record.id).await.unwrap_err();
    assert!(matches!(
        err,
        dockhand::store::StoreError::DeploymentNotFound(_)
    ));
}

// ---------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------

async fn run_full_cycle(
    pipeline: &dockhand::pipeline::Pipeline<
        dockhand::store::MemoryStore,
        std::sync::Arc<support::RecordingExecutor>,
    >,
    id: DeploymentId,
) {
    pipeline.start_cycle(id, None).await.unwrap();
    pipeline.retrieve_source(id).await.unwrap();
    pipeline.build_artifacts(id).await.unwrap();
    pipeline.run_containers(id).await.unwrap();
}
