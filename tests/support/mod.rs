// ABOUTME: Test support utilities shared across integration suites.
// ABOUTME: Provides a recording executor and stack configuration fixtures.

use async_trait::async_trait;
use dockhand::catalog::Catalog;
use dockhand::config::StackConfig;
use dockhand::exec::{ExecError, Executor};
use dockhand::layout::Layout;
use dockhand::pipeline::Pipeline;
use dockhand::store::{DeploymentRecord, MemoryStore};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

/// One recorded `execute` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecCall {
    pub phase: String,
    pub build_number: u32,
    pub commands: Vec<String>,
}

/// Executor double: records every call, optionally failing a chosen phase.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<ExecCall>>,
    fail_phase: Mutex<Option<String>>,
}

#[allow(dead_code)]
impl RecordingExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_on(&self, phase: &str) {
        *self.fail_phase.lock() = Some(phase.to_string());
    }

    pub fn calls(&self) -> Vec<ExecCall> {
        self.calls.lock().clone()
    }

    pub fn phases(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.phase.clone()).collect()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl Executor for RecordingExecutor {
    async fn execute(
        &self,
        _working_dir: &Path,
        _log_dir: &Path,
        phase: &str,
        build_number: u32,
        commands: &[String],
    ) -> Result<(), ExecError> {
        self.calls.lock().push(ExecCall {
            phase: phase.to_string(),
            build_number,
            commands: commands.to_vec(),
        });

        if self.fail_phase.lock().as_deref() == Some(phase) {
            return Err(ExecError::CommandFailed {
                command: commands.first().cloned().unwrap_or_default(),
                code: 1,
            });
        }
        Ok(())
    }
}

/// A stack with one build target and one database, no proxy.
#[allow(dead_code)]
pub fn sample_config(project: &str) -> StackConfig {
    let yaml = format!(
        r#"
project: {project}
git:
  repository_url: https://git.example.com/acme/{project}.git
  branch: main
builds:
  - name: api
    framework: spring-boot
    version: "17"
    source_dir: backend
    build_dir: build/libs
    properties:
      - kind: publish
        value: "8080"
databases:
  - name: maindb
    framework: mysql
    version: "8.0"
    port: "3306"
    env:
      - key: MYSQL_ROOT_PASSWORD
        value: secret
"#
    );
    StackConfig::from_yaml(&yaml).expect("sample config parses")
}

/// Same stack plus an https-less proxy in front of the api target.
#[allow(dead_code)]
pub fn proxied_config(project: &str) -> StackConfig {
    let yaml = format!(
        r#"
project: {project}
git:
  repository_url: https://git.example.com/acme/{project}.git
  branch: main
builds:
  - name: web
    framework: react
    version: stable
    source_dir: frontend
    build_dir: dist
    proxy_exposed: true
    properties:
      - kind: publish
        value: "3000"
  - name: api
    framework: spring-boot
    version: "17"
    source_dir: backend
    build_dir: build/libs
    properties:
      - kind: publish
        value: "8080"
proxy:
  domains: [shop.example.com]
  locations:
    - path: /api
      upstream: http://localhost:8080
"#
    );
    StackConfig::from_yaml(&yaml).expect("proxied config parses")
}

/// Build a pipeline over a memory store, submit the given configuration,
/// and clear the setup-phase executor calls.
#[allow(dead_code)]
pub async fn applied_pipeline(
    root: &Path,
    config: &StackConfig,
) -> (
    Pipeline<MemoryStore, Arc<RecordingExecutor>>,
    Arc<RecordingExecutor>,
    DeploymentRecord,
) {
    let executor = RecordingExecutor::new();
    let pipeline = Pipeline::new(
        MemoryStore::new(),
        executor.clone(),
        Layout::new(root),
        Catalog::builtin(),
    );

    let record = pipeline.apply(config).await.expect("apply succeeds");
    executor.clear();
    (pipeline, executor, record)
}
