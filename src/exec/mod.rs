// ABOUTME: Command execution capability: ordered commands, captured logs, failure on non-zero exit.
// ABOUTME: ShellExecutor runs commands through `sh -c` with a configurable timeout.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("command `{command}` exited with status {code}")]
    CommandFailed { command: String, code: i32 },

    #[error("command `{command}` timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },

    #[error("failed to write command log: {0}")]
    Log(#[from] std::io::Error),
}

/// Runs ordered commands in a working directory, capturing combined output
/// to a log named `{phase}_{build_number}` under the log directory. The
/// first failing command aborts the sequence.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(
        &self,
        working_dir: &Path,
        log_dir: &Path,
        phase: &str,
        build_number: u32,
        commands: &[String],
    ) -> Result<(), ExecError>;
}

#[async_trait]
impl<T: Executor + ?Sized> Executor for Arc<T> {
    async fn execute(
        &self,
        working_dir: &Path,
        log_dir: &Path,
        phase: &str,
        build_number: u32,
        commands: &[String],
    ) -> Result<(), ExecError> {
        (**self)
            .execute(working_dir, log_dir, phase, build_number, commands)
            .await
    }
}

/// Log file name for one phase of one build cycle.
pub fn log_file_name(phase: &str, build_number: u32) -> String {
    format!("{phase}_{build_number}")
}

/// Executes commands through `sh -c` on the deployment host.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    timeout: Duration,
}

impl ShellExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        // Image builds can take minutes; expiry counts as a failure.
        Self::new(Duration::from_secs(600))
    }
}

#[async_trait]
impl Executor for ShellExecutor {
    async fn execute(
        &self,
        working_dir: &Path,
        log_dir: &Path,
        phase: &str,
        build_number: u32,
        commands: &[String],
    ) -> Result<(), ExecError> {
        tokio::fs::create_dir_all(log_dir).await?;
        let log_path = log_dir.join(log_file_name(phase, build_number));
        let mut log = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .await?;

        for command in commands {
            tracing::info!(phase, build_number, %command, "executing");
            log.write_all(format!("$ {command}\n").as_bytes()).await?;

            let child = Command::new("sh")
                .arg("-c")
                .arg(command)
                .current_dir(working_dir)
                .output();

            let output = match tokio::time::timeout(self.timeout, child).await {
                Ok(Ok(output)) => output,
                Ok(Err(source)) => {
                    return Err(ExecError::Spawn {
                        command: command.clone(),
                        source,
                    });
                }
                Err(_) => {
                    log.write_all(b"(timed out)\n").await?;
                    return Err(ExecError::Timeout {
                        command: command.clone(),
                        seconds: self.timeout.as_secs(),
                    });
                }
            };

            log.write_all(&output.stdout).await?;
            log.write_all(&output.stderr).await?;

            if !output.status.success() {
                let code = output.status.code().unwrap_or(-1);
                tracing::error!(phase, build_number, %command, code, "command failed");
                return Err(ExecError::CommandFailed {
                    command: command.clone(),
                    code,
                });
            }
        }

        Ok(())
    }
}
