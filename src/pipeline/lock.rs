// ABOUTME: Per-deployment pipeline lock held for the duration of one build cycle.
// ABOUTME: Atomic lock-file creation with holder info stored as JSON.

use super::error::PipelineError;
use crate::types::ProjectName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Information about who holds a pipeline lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
    /// Project being deployed.
    pub project: String,
}

impl LockInfo {
    pub fn new(project: &ProjectName) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            project: project.to_string(),
        }
    }

    /// A lock older than an hour is considered abandoned.
    pub fn is_stale(&self) -> bool {
        let age = Utc::now() - self.started_at;
        age.num_hours() >= 1
    }
}

/// A held pipeline lock. Released explicitly or on drop, so a panicking
/// cycle does not wedge the deployment.
#[derive(Debug)]
pub struct PipelineLock {
    path: PathBuf,
    released: bool,
}

impl PipelineLock {
    /// Acquire the lock for one deployment.
    ///
    /// Lock-file creation uses `create_new` for atomicity. An existing lock
    /// is broken when stale (>1 hour), corrupted, or when `force` is set;
    /// otherwise the holder info is reported back to the caller.
    pub fn acquire(
        lock_dir: &Path,
        project: &ProjectName,
        force: bool,
    ) -> Result<Self, PipelineError> {
        fs::create_dir_all(lock_dir).map_err(|e| PipelineError::Lock {
            message: format!("create lock directory: {e}"),
        })?;

        let path = lock_dir.join(format!("{project}.lock"));
        let info = LockInfo::new(project);

        if Self::try_create(&path, &info)? {
            return Ok(Self {
                path,
                released: false,
            });
        }

        if !Self::should_break(&path, force)? {
            let existing = Self::read_info(&path);
            return match existing {
                Some(existing) => Err(PipelineError::LockHeld {
                    holder: existing.holder,
                    pid: existing.pid,
                    since: existing.started_at,
                }),
                None => Err(PipelineError::Lock {
                    message: "lock held by another process".into(),
                }),
            };
        }

        tracing::debug!(path = %path.display(), "removing stale or forced lock");
        let _ = fs::remove_file(&path);

        if !Self::try_create(&path, &info)? {
            return Err(PipelineError::Lock {
                message: "lock acquired by another process during break".into(),
            });
        }

        Ok(Self {
            path,
            released: false,
        })
    }

    /// Atomic create-if-not-exists. Returns false when the file already
    /// exists (lock held).
    fn try_create(path: &Path, info: &LockInfo) -> Result<bool, PipelineError> {
        let file = OpenOptions::new().write(true).create_new(true).open(path);
        let mut file = match file {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => {
                return Err(PipelineError::Lock {
                    message: format!("create lock file: {e}"),
                });
            }
        };

        let json = serde_json::to_string(info).map_err(|e| PipelineError::Lock {
            message: format!("serialize lock info: {e}"),
        })?;
        file.write_all(json.as_bytes())
            .map_err(|e| PipelineError::Lock {
                message: format!("write lock info: {e}"),
            })?;
        Ok(true)
    }

    /// Whether an existing lock should be broken: stale, forced, or corrupted.
    fn should_break(path: &Path, force: bool) -> Result<bool, PipelineError> {
        match Self::read_info(path) {
            Some(existing) => {
                if force {
                    tracing::warn!(
                        holder = %existing.holder,
                        pid = existing.pid,
                        since = %existing.started_at,
                        "breaking lock on request"
                    );
                    Ok(true)
                } else if existing.is_stale() {
                    tracing::warn!(
                        holder = %existing.holder,
                        pid = existing.pid,
                        since = %existing.started_at,
                        "auto-breaking stale lock"
                    );
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            None => {
                tracing::warn!(path = %path.display(), "lock info unreadable, breaking lock");
                Ok(true)
            }
        }
    }

    fn read_info(path: &Path) -> Option<LockInfo> {
        let content = fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Release the lock.
    pub fn release(mut self) {
        let _ = fs::remove_file(&self.path);
        self.released = true;
    }
}

impl Drop for PipelineLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = fs::remove_file(&self.path);
        }
    }
}
