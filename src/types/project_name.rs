// ABOUTME: Validated project name used for container, network, and directory naming.
// ABOUTME: Follows RFC 1123 label requirements so derived names are engine-safe.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectNameError {
    #[error("project name cannot be empty")]
    Empty,

    #[error("project name exceeds maximum length of 63 characters")]
    TooLong,

    #[error("project name cannot start with a hyphen")]
    StartsWithHyphen,

    #[error("project name cannot end with a hyphen")]
    EndsWithHyphen,

    #[error("project name must be lowercase")]
    NotLowercase,

    #[error("invalid character in project name: '{0}'")]
    InvalidChar(char),
}

/// The name of one deployed stack. Doubles as the container name prefix,
/// the network name, and the directory name under the data root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectName(String);

impl ProjectName {
    pub fn new(value: &str) -> Result<Self, ProjectNameError> {
        if value.is_empty() {
            return Err(ProjectNameError::Empty);
        }

        if value.len() > 63 {
            return Err(ProjectNameError::TooLong);
        }

        if value.starts_with('-') {
            return Err(ProjectNameError::StartsWithHyphen);
        }

        if value.ends_with('-') {
            return Err(ProjectNameError::EndsWithHyphen);
        }

        for c in value.chars() {
            if c.is_ascii_uppercase() {
                return Err(ProjectNameError::NotLowercase);
            }
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
                return Err(ProjectNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for ProjectName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ProjectName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        ProjectName::new(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_dns_label_names() {
        assert!(ProjectName::new("my-stack-01").is_ok());
    }

    #[test]
    fn rejects_uppercase() {
        assert!(matches!(
            ProjectName::new("MyStack"),
            Err(ProjectNameError::NotLowercase)
        ));
    }

    #[test]
    fn rejects_empty_and_hyphen_edges() {
        assert!(matches!(ProjectName::new(""), Err(ProjectNameError::Empty)));
        assert!(matches!(
            ProjectName::new("-app"),
            Err(ProjectNameError::StartsWithHyphen)
        ));
        assert!(matches!(
            ProjectName::new("app-"),
            Err(ProjectNameError::EndsWithHyphen)
        ));
    }

    #[test]
    fn rejects_invalid_characters() {
        assert!(matches!(
            ProjectName::new("my_app"),
            Err(ProjectNameError::InvalidChar('_'))
        ));
    }
}
