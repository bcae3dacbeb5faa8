// ABOUTME: Filesystem layout for deployment working directories, logs, snapshots, and volumes.
// ABOUTME: Everything lives under a single configurable data root.

use crate::types::ProjectName;
use std::path::{Path, PathBuf};

pub const REPO_DIR: &str = "repo";
pub const LOG_DIR: &str = "logs";
pub const CONFIG_DIR: &str = "config";
pub const VOLUME_DIR: &str = "volumes";
pub const LOCK_DIR: &str = "locks";
const STORE_FILE: &str = "deployments.json";

/// Resolves per-deployment paths under the data root:
///
/// ```text
/// <root>/<project>/repo      source working directory
/// <root>/<project>/logs      captured command output per phase
/// <root>/<project>/config    JSON snapshot of the resolved specs
/// <root>/volumes/<project>   bind-mount targets
/// <root>/locks               pipeline lock files
/// ```
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_dir(&self, project: &ProjectName) -> PathBuf {
        self.root.join(project.as_str())
    }

    pub fn repo_dir(&self, project: &ProjectName) -> PathBuf {
        self.project_dir(project).join(REPO_DIR)
    }

    pub fn log_dir(&self, project: &ProjectName) -> PathBuf {
        self.project_dir(project).join(LOG_DIR)
    }

    pub fn config_dir(&self, project: &ProjectName) -> PathBuf {
        self.project_dir(project).join(CONFIG_DIR)
    }

    pub fn volume_root(&self) -> PathBuf {
        self.root.join(VOLUME_DIR)
    }

    pub fn volume_dir(&self, project: &ProjectName) -> PathBuf {
        self.volume_root().join(project.as_str())
    }

    /// Data volume for one database container.
    pub fn db_volume_dir(&self, project: &ProjectName, db_name: &str) -> PathBuf {
        self.volume_dir(project).join(db_name)
    }

    /// Dump/restore location resolved against the deployment volume.
    pub fn dump_path(&self, project: &ProjectName, relative: &str) -> PathBuf {
        self.volume_dir(project).join(relative.trim_start_matches('/'))
    }

    pub fn lock_dir(&self) -> PathBuf {
        self.root.join(LOCK_DIR)
    }

    pub fn store_path(&self) -> PathBuf {
        self.root.join(STORE_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_nest_under_root() {
        let layout = Layout::new("/data");
        let project = ProjectName::new("shop").unwrap();

        assert_eq!(layout.repo_dir(&project), PathBuf::from("/data/shop/repo"));
        assert_eq!(layout.log_dir(&project), PathBuf::from("/data/shop/logs"));
        assert_eq!(
            layout.db_volume_dir(&project, "shopdb"),
            PathBuf::from("/data/volumes/shop/shopdb")
        );
    }

    #[test]
    fn dump_path_strips_leading_slash() {
        let layout = Layout::new("/data");
        let project = ProjectName::new("shop").unwrap();
        assert_eq!(
            layout.dump_path(&project, "/backup/init.sql"),
            PathBuf::from("/data/volumes/shop/backup/init.sql")
        );
    }
}
