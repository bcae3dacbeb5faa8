// ABOUTME: Runtime property model shared by build and database specs.
// ABOUTME: A typed host/container value pair consumed by the command adapter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a runtime property maps: a bind mount, a port mapping, or an
/// environment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    Volume,
    Publish,
    Environment,
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKind::Volume => write!(f, "volume"),
            PropertyKind::Publish => write!(f, "publish"),
            PropertyKind::Environment => write!(f, "environment"),
        }
    }
}

/// A typed host-side / container-side value pair.
///
/// `volume` properties are internal and derived; they never appear in the
/// user-facing configuration view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeProperty {
    pub kind: PropertyKind,
    pub host: String,
    pub container: String,
}

impl RuntimeProperty {
    pub fn new(kind: PropertyKind, host: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            kind,
            host: host.into(),
            container: container.into(),
        }
    }

    pub fn volume(host: impl Into<String>, container: impl Into<String>) -> Self {
        Self::new(PropertyKind::Volume, host, container)
    }

    pub fn publish(host: impl Into<String>, container: impl Into<String>) -> Self {
        Self::new(PropertyKind::Publish, host, container)
    }

    pub fn environment(host: impl Into<String>, container: impl Into<String>) -> Self {
        Self::new(PropertyKind::Environment, host, container)
    }
}
