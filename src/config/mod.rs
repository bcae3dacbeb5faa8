// ABOUTME: User-facing stack configuration types and parsing for stack.yml.
// ABOUTME: Handles YAML parsing, validating deserializers, and template generation.

use crate::error::{Error, Result};
use crate::types::{ProjectName, PropertyKind};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "stack.yml";
pub const CONFIG_FILENAME_ALT: &str = "stack.yaml";

/// One submitted stack configuration: the declarative description of what to
/// build and run for a single deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct StackConfig {
    pub project: ProjectName,

    pub git: GitBinding,

    #[serde(default)]
    pub builds: Vec<BuildInput>,

    #[serde(default)]
    pub databases: Vec<DbInput>,

    #[serde(default)]
    pub proxy: Option<ProxyInput>,

    /// Upper bound for a single external command. Image builds can take
    /// minutes; expiry is treated the same as a non-zero exit.
    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,
}

/// Source-control binding for a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitBinding {
    pub repository_url: String,
    pub branch: String,
    #[serde(default)]
    pub access_token: Option<String>,
}

/// One application build target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildInput {
    pub name: String,
    pub framework: String,
    /// Human-entered version label, resolved against the catalog.
    pub version: String,
    #[serde(default)]
    pub properties: Vec<BuildProperty>,
    /// Subdirectory of the repository holding this target's sources.
    #[serde(default)]
    pub source_dir: String,
    /// Subdirectory (relative to source_dir) where build output lands.
    #[serde(default)]
    pub build_dir: String,
    /// Build strategy tag, recorded on the resolved spec.
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Exactly one build target must carry this flag when a proxy is configured.
    #[serde(default)]
    pub proxy_exposed: bool,
}

/// A user-visible (kind, value) property pair for a build target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildProperty {
    pub kind: PropertyKind,
    pub value: String,
}

/// One database target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbInput {
    pub name: String,
    pub framework: String,
    pub version: String,
    /// Host-side port; the container side comes from the catalog.
    pub port: String,
    #[serde(default)]
    pub env: Vec<EnvPair>,
    /// Dump/restore file or directory, relative to the deployment volume.
    #[serde(default)]
    pub dump_location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvPair {
    pub key: String,
    pub value: String,
}

impl EnvPair {
    pub fn is_empty(&self) -> bool {
        self.key.trim().is_empty() || self.value.trim().is_empty()
    }
}

/// User-facing reverse-proxy configuration. Maps 1:1 onto the resolved
/// proxy spec; an input with no domains and no locations means the proxy
/// category is unconfigured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyInput {
    #[serde(default)]
    pub domains: Vec<String>,

    #[serde(default)]
    pub locations: Vec<ProxyLocationInput>,

    #[serde(default)]
    pub https: bool,

    #[serde(default)]
    pub tls: Option<TlsInput>,

    #[serde(default = "default_max_body_size")]
    pub max_body_size_mb: u32,
}

impl ProxyInput {
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty() && self.locations.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyLocationInput {
    pub path: String,
    pub upstream: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsInput {
    pub certificate: String,
    pub certificate_key: String,
    /// Directory holding the certificate material, bind-mounted into the
    /// proxy-exposed container.
    pub asset_dir: String,
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_max_body_size() -> u32 {
    50
}

fn default_strategy() -> String {
    "dockerfile".to_string()
}

impl StackConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [dir.join(CONFIG_FILENAME), dir.join(CONFIG_FILENAME_ALT)];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }
}

/// Write a starter stack.yml into `dir`.
pub fn init_config(dir: &Path, project: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let name = match project {
        Some(p) => ProjectName::new(p)
            .map_err(|e| Error::Validation(e.to_string()))?
            .to_string(),
        None => "my-stack".to_string(),
    };

    let yaml = template_yaml(&name);
    std::fs::write(&config_path, yaml)?;

    Ok(())
}

fn template_yaml(project: &str) -> String {
    format!(
        r#"project: {project}
git:
  repository_url: https://git.example.com/team/{project}.git
  branch: main
builds:
  - name: backend
    framework: spring-boot
    version: "17"
    source_dir: backend
    build_dir: build/libs
    properties:
      - kind: publish
        value: "8080"
databases:
  - name: db
    framework: mysql
    version: "8.0"
    port: "3306"
    env:
      - key: MYSQL_ROOT_PASSWORD
        value: change-me
"#
    )
}
