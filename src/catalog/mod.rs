// ABOUTME: Framework catalog: version label to image tag mappings and per-framework defaults.
// ABOUTME: Loaded from YAML or built in; lookup failures are terminal configuration errors.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The set of frameworks a stack configuration may reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub frameworks: Vec<FrameworkEntry>,
}

/// One framework the catalog knows how to build or run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameworkEntry {
    pub id: String,
    pub name: String,
    pub family: String,
    /// Image repository the resolved tag applies to.
    pub image: String,
    #[serde(default)]
    pub versions: Vec<VersionMapping>,
    /// Frameworks whose runtime always listens on a fixed container port.
    #[serde(default)]
    pub fixed_internal_port: Option<u16>,
    #[serde(default)]
    pub database: Option<DbDefaults>,
    /// Dockerfile template with `{image}`, `{tag}` and `{build_dir}` placeholders.
    #[serde(default)]
    pub dockerfile: Option<String>,
}

/// Bidirectional mapping between a human-entered version label and an image tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionMapping {
    pub label: String,
    pub tag: String,
}

/// Fixed runtime knowledge for database frameworks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbDefaults {
    /// Container-side port the engine listens on.
    pub port: String,
    /// Mount point for the data volume.
    pub data_mount: String,
    /// Mount point for dump/restore scripts picked up at first start.
    pub init_mount: String,
    #[serde(default)]
    pub extra_volumes: Vec<VolumeBinding>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeBinding {
    pub host: String,
    pub container: String,
}

impl Catalog {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Look up a framework entry by id.
    pub fn entry(&self, id: &str) -> Result<&FrameworkEntry> {
        self.frameworks
            .iter()
            .find(|f| f.id == id)
            .ok_or_else(|| Error::NotFound(format!("framework {id}")))
    }

    /// The catalog shipped with the binary. A YAML catalog loaded with
    /// [`Catalog::load`] replaces it wholesale.
    pub fn builtin() -> Self {
        Catalog {
            frameworks: vec![
                FrameworkEntry {
                    id: "spring-boot".into(),
                    name: "Spring Boot".into(),
                    family: "java".into(),
                    image: "openjdk".into(),
                    versions: vec![
                        VersionMapping {
                            label: "11".into(),
                            tag: "11-jdk".into(),
                        },
                        VersionMapping {
                            label: "17".into(),
                            tag: "17-jdk".into(),
                        },
                    ],
                    fixed_internal_port: None,
                    database: None,
                    dockerfile: Some(
                        "FROM {image}:{tag}\n\
                         WORKDIR /app\n\
                         COPY . .\n\
                         RUN ./gradlew bootJar --no-daemon\n\
                         CMD [\"sh\", \"-c\", \"java -jar {build_dir}/*.jar\"]\n"
                            .into(),
                    ),
                },
                FrameworkEntry {
                    id: "django".into(),
                    name: "Django".into(),
                    family: "python".into(),
                    image: "python".into(),
                    versions: vec![
                        VersionMapping {
                            label: "3.10".into(),
                            tag: "3.10-slim".into(),
                        },
                        VersionMapping {
                            label: "3.11".into(),
                            tag: "3.11-slim".into(),
                        },
                    ],
                    // The Django runtime always listens on 8000 inside the container.
                    fixed_internal_port: Some(8000),
                    database: None,
                    dockerfile: Some(
                        "FROM {image}:{tag}\n\
                         WORKDIR /app\n\
                         COPY . .\n\
                         RUN pip install -r requirements.txt\n\
                         EXPOSE 8000\n\
                         CMD [\"python\", \"manage.py\", \"runserver\", \"0.0.0.0:8000\"]\n"
                            .into(),
                    ),
                },
                FrameworkEntry {
                    id: "react".into(),
                    name: "React".into(),
                    family: "node".into(),
                    image: "nginx".into(),
                    versions: vec![VersionMapping {
                        label: "stable".into(),
                        tag: "stable-alpine".into(),
                    }],
                    fixed_internal_port: None,
                    database: None,
                    dockerfile: Some(
                        "FROM node:lts AS build\n\
                         WORKDIR /app\n\
                         COPY . .\n\
                         RUN npm ci && npm run build\n\
                         FROM {image}:{tag}\n\
                         COPY nginx.conf /etc/nginx/conf.d/default.conf\n\
                         COPY --from=build /app/{build_dir} /usr/share/nginx/html\n"
                            .into(),
                    ),
                },
                FrameworkEntry {
                    id: "express".into(),
                    name: "Express".into(),
                    family: "node".into(),
                    image: "node".into(),
                    versions: vec![
                        VersionMapping {
                            label: "18".into(),
                            tag: "18-alpine".into(),
                        },
                        VersionMapping {
                            label: "20".into(),
                            tag: "20-alpine".into(),
                        },
                    ],
                    fixed_internal_port: None,
                    database: None,
                    dockerfile: Some(
                        "FROM {image}:{tag}\n\
                         WORKDIR /app\n\
                         COPY . .\n\
                         RUN npm ci\n\
                         CMD [\"npm\", \"start\"]\n"
                            .into(),
                    ),
                },
                FrameworkEntry {
                    id: "mysql".into(),
                    name: "MySQL".into(),
                    family: "mysql".into(),
                    image: "mysql".into(),
                    versions: vec![
                        VersionMapping {
                            label: "5.7".into(),
                            tag: "5.7".into(),
                        },
                        VersionMapping {
                            label: "8.0".into(),
                            tag: "8.0".into(),
                        },
                    ],
                    fixed_internal_port: None,
                    database: Some(DbDefaults {
                        port: "3306".into(),
                        data_mount: "/var/lib/mysql".into(),
                        init_mount: "/docker-entrypoint-initdb.d".into(),
                        extra_volumes: vec![],
                    }),
                    dockerfile: None,
                },
                FrameworkEntry {
                    id: "mongodb".into(),
                    name: "MongoDB".into(),
                    family: "mongo".into(),
                    image: "mongo".into(),
                    versions: vec![VersionMapping {
                        label: "6.0".into(),
                        tag: "6.0".into(),
                    }],
                    fixed_internal_port: None,
                    database: Some(DbDefaults {
                        port: "27017".into(),
                        data_mount: "/data/db".into(),
                        init_mount: "/docker-entrypoint-initdb.d".into(),
                        extra_volumes: vec![],
                    }),
                    dockerfile: None,
                },
            ],
        }
    }
}

impl FrameworkEntry {
    /// Resolve a human-entered version label to its image tag.
    pub fn tag_for_label(&self, label: &str) -> Result<&str> {
        self.versions
            .iter()
            .find(|v| v.label == label)
            .map(|v| v.tag.as_str())
            .ok_or_else(|| Error::VersionMismatch {
                framework: self.id.clone(),
                version: label.to_string(),
            })
    }

    /// Resolve an image tag back to the version label a user entered.
    pub fn label_for_tag(&self, tag: &str) -> Result<&str> {
        self.versions
            .iter()
            .find(|v| v.tag == tag)
            .map(|v| v.label.as_str())
            .ok_or_else(|| Error::VersionMismatch {
                framework: self.id.clone(),
                version: tag.to_string(),
            })
    }
}
