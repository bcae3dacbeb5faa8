// ABOUTME: JSON snapshot persistence for resolved specs with an explicit manifest.
// ABOUTME: Snapshots are replaced wholesale on every configuration update.

use super::{BuildSpec, DbSpec, ProxySpec};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const MANIFEST_FILE: &str = "manifest";
pub const BUILD_FILE: &str = "build";
pub const DB_FILE: &str = "db";
pub const PROXY_FILE: &str = "proxy";

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Records which configuration categories exist, written at snapshot time.
/// Readers consult the manifest instead of scanning the directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub build: bool,
    pub db: bool,
    pub proxy: bool,
}

/// The resolved configuration of one deployment as persisted on disk.
/// An absent category means it is unconfigured.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub builds: Vec<BuildSpec>,
    pub databases: Vec<DbSpec>,
    pub proxy: Option<ProxySpec>,
}

impl Snapshot {
    pub fn manifest(&self) -> Manifest {
        Manifest {
            build: !self.builds.is_empty(),
            db: !self.databases.is_empty(),
            proxy: self.proxy.is_some(),
        }
    }

    /// Replace the snapshot directory wholesale. The manifest is written
    /// last so a partially written snapshot reads as unconfigured.
    pub fn write(&self, dir: &Path) -> Result<(), SnapshotError> {
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        fs::create_dir_all(dir)?;

        if !self.builds.is_empty() {
            write_json(&dir.join(BUILD_FILE), &self.builds)?;
        }
        if !self.databases.is_empty() {
            write_json(&dir.join(DB_FILE), &self.databases)?;
        }
        if let Some(proxy) = &self.proxy {
            write_json(&dir.join(PROXY_FILE), proxy)?;
        }

        write_json(&dir.join(MANIFEST_FILE), &self.manifest())?;
        Ok(())
    }

    /// Load the snapshot for a deployment. A missing manifest means nothing
    /// has been configured yet.
    pub fn read(dir: &Path) -> Result<Self, SnapshotError> {
        let manifest_path = dir.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            return Ok(Self::default());
        }

        let manifest: Manifest = read_json(&manifest_path)?;
        let mut snapshot = Self::default();

        if manifest.build {
            snapshot.builds = read_json(&dir.join(BUILD_FILE))?;
        }
        if manifest.db {
            snapshot.databases = read_json(&dir.join(DB_FILE))?;
        }
        if manifest.proxy {
            snapshot.proxy = Some(read_json(&dir.join(PROXY_FILE))?);
        }

        Ok(snapshot)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), SnapshotError> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, SnapshotError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RuntimeProperty;

    fn build_spec(name: &str) -> BuildSpec {
        BuildSpec {
            name: name.into(),
            framework: "spring-boot".into(),
            image: "openjdk".into(),
            tag: "17-jdk".into(),
            properties: vec![RuntimeProperty::publish("8080", "8080")],
            source_dir: "backend".into(),
            build_dir: "build/libs".into(),
            strategy: "dockerfile".into(),
            proxy_exposed: false,
        }
    }

    #[test]
    fn missing_directory_reads_as_unconfigured() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = Snapshot::read(&dir.path().join("config")).unwrap();
        assert!(snapshot.builds.is_empty());
        assert!(snapshot.databases.is_empty());
        assert!(snapshot.proxy.is_none());
    }

    #[test]
    fn manifest_reflects_present_categories() {
        let snapshot = Snapshot {
            builds: vec![build_spec("api")],
            databases: vec![],
            proxy: None,
        };
        assert_eq!(
            snapshot.manifest(),
            Manifest {
                build: true,
                db: false,
                proxy: false,
            }
        );
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");

        let snapshot = Snapshot {
            builds: vec![build_spec("api"), build_spec("worker")],
            databases: vec![],
            proxy: None,
        };
        snapshot.write(&path).unwrap();

        let loaded = Snapshot::read(&path).unwrap();
        assert_eq!(loaded.builds, snapshot.builds);
        assert!(loaded.proxy.is_none());
    }

    #[test]
    fn rewrite_drops_stale_categories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");

        Snapshot {
            builds: vec![build_spec("api")],
            databases: vec![],
            proxy: None,
        }
        .write(&path)
        .unwrap();

        // A later submission without builds must not leave the old file visible.
        Snapshot::default().write(&path).unwrap();

        let loaded = Snapshot::read(&path).unwrap();
        assert!(loaded.builds.is_empty());
        assert!(!path.join(BUILD_FILE).exists());
    }
}
