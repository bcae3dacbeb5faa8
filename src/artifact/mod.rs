// ABOUTME: Resolved artifact specifications produced by the configuration translator.
// ABOUTME: Persisted as JSON snapshots and consumed by the command adapter.

mod snapshot;

pub use snapshot::{Manifest, Snapshot, SnapshotError};

use crate::types::{ProjectName, PropertyKind, RuntimeProperty};
use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};

/// An artifact-ready build target: catalog lookups resolved, properties
/// expanded, proxy overrides applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildSpec {
    pub name: String,
    pub framework: String,
    /// Base image repository from the catalog entry.
    pub image: String,
    /// Resolved image tag.
    pub tag: String,
    pub properties: Vec<RuntimeProperty>,
    pub source_dir: String,
    pub build_dir: String,
    pub strategy: String,
    #[serde(default)]
    pub proxy_exposed: bool,
}

impl BuildSpec {
    /// Name of the container (and of the locally built image) for this target.
    pub fn container_name(&self, project: &ProjectName) -> String {
        format!("{project}-{}", self.name)
    }
}

/// An artifact-ready database target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbSpec {
    pub name: String,
    pub framework: String,
    pub image: String,
    pub tag: String,
    pub properties: Vec<RuntimeProperty>,
    /// Absolute dump/restore location under the deployment volume.
    pub dump_location: String,
    /// Container path where dump/restore scripts are picked up.
    #[serde(default)]
    pub init_mount: Option<String>,
}

impl DbSpec {
    pub fn container_name(&self, project: &ProjectName) -> String {
        format!("{project}-{}", self.name)
    }

    /// The host-side published port, if any.
    pub fn host_port(&self) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.kind == PropertyKind::Publish)
            .map(|p| p.host.as_str())
    }
}

/// Resolved reverse-proxy configuration.
///
/// Invariant: when `https` is set, `tls` is present with non-blank fields.
/// The translator enforces this before a spec is ever constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxySpec {
    pub domains: NonEmpty<String>,
    pub locations: Vec<ProxyLocation>,
    pub https: bool,
    #[serde(default)]
    pub tls: Option<TlsMaterial>,
    pub max_body_size_mb: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyLocation {
    pub path: String,
    pub upstream: String,
}

impl ProxyLocation {
    /// A location is empty when either side is blank; empty locations are
    /// skipped by the config generator.
    pub fn is_empty(&self) -> bool {
        self.path.trim().is_empty() || self.upstream.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TlsMaterial {
    pub certificate: String,
    pub certificate_key: String,
    pub asset_dir: String,
}
