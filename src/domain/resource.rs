// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource identity and taxonomy
//!
//! Every declaration in a deployment unit is addressed by a [`ResourceId`]
//! (its logical name inside the unit) and classified by a [`ResourceKind`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical identifier of a declared resource, unique within its unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Create a resource identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ResourceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Kinds of resources this crate knows how to provision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Virtual network (owned or looked up)
    Fabric,
    /// Security group inside a fabric
    SecurityGroup,
    /// Execution identity (role)
    Identity,
    /// Policy document attached to an identity
    Policy,
    /// Object-storage bucket
    Bucket,
    /// Streaming cluster
    Cluster,
    /// Value published to the exchange
    Parameter,
    /// Custom plugin artifact
    Artifact,
    /// Sink connector runtime
    Connector,
    /// Session-access compute instance
    Instance,
}

impl ResourceKind {
    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fabric => "fabric",
            Self::SecurityGroup => "security_group",
            Self::Identity => "identity",
            Self::Policy => "policy",
            Self::Bucket => "bucket",
            Self::Cluster => "cluster",
            Self::Parameter => "parameter",
            Self::Artifact => "artifact",
            Self::Connector => "connector",
            Self::Instance => "instance",
        }
    }

    /// Whether a changed declaration can be applied in place
    ///
    /// Kinds that return `false` must be destroyed and re-created to change.
    pub fn supports_update(&self) -> bool {
        matches!(
            self,
            Self::Identity | Self::Policy | Self::Parameter | Self::Artifact | Self::Connector
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens to a resource when its unit is destroyed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    /// Delete together with the unit
    #[default]
    Destroy,
    /// Leave in place; the unit forgets about it
    Retain,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_id_display() {
        let id = ResourceId::from("msk-cluster");
        assert_eq!(id.to_string(), "msk-cluster");
        assert_eq!(id.as_str(), "msk-cluster");
    }

    #[test]
    fn test_update_support() {
        assert!(ResourceKind::Connector.supports_update());
        assert!(ResourceKind::Artifact.supports_update());
        assert!(!ResourceKind::Cluster.supports_update());
        assert!(!ResourceKind::Fabric.supports_update());
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&ResourceKind::SecurityGroup).unwrap();
        assert_eq!(json, "\"security_group\"");
    }
}
