// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resolved resource outputs
//!
//! What a resource yields once applied. Downstream declarations read these
//! through [`Outputs`]; a missing entry means the prerequisite has not been
//! applied yet.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{ArtifactHandle, BootstrapAddress, FabricHandle, ResourceId, ResourceKind};
use crate::errors::{ProvisioningError, ProvisioningResult};
use crate::exchange::ParameterKey;

/// Cluster once it reported ready
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterOutput {
    pub arn: String,
    pub bootstrap: BootstrapAddress,
    pub security_group_id: String,
}

/// Output of one applied resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceOutput {
    Fabric(FabricHandle),
    SecurityGroup { group_id: String },
    Identity { name: String, arn: String },
    Policy { policy_id: String },
    Bucket { name: String, arn: String },
    Cluster(ClusterOutput),
    Parameter { key: ParameterKey, value: String },
    Artifact(ArtifactHandle),
    Connector { arn: String, artifact: ArtifactHandle },
    Instance { instance_id: String },
}

impl ResourceOutput {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceOutput::Fabric(_) => ResourceKind::Fabric,
            ResourceOutput::SecurityGroup { .. } => ResourceKind::SecurityGroup,
            ResourceOutput::Identity { .. } => ResourceKind::Identity,
            ResourceOutput::Policy { .. } => ResourceKind::Policy,
            ResourceOutput::Bucket { .. } => ResourceKind::Bucket,
            ResourceOutput::Cluster(_) => ResourceKind::Cluster,
            ResourceOutput::Parameter { .. } => ResourceKind::Parameter,
            ResourceOutput::Artifact(_) => ResourceKind::Artifact,
            ResourceOutput::Connector { .. } => ResourceKind::Connector,
            ResourceOutput::Instance { .. } => ResourceKind::Instance,
        }
    }

    /// Identifier the control plane knows the resource by
    pub fn physical_id(&self) -> String {
        match self {
            ResourceOutput::Fabric(handle) => handle.fabric_id.clone(),
            ResourceOutput::SecurityGroup { group_id } => group_id.clone(),
            ResourceOutput::Identity { name, .. } => name.clone(),
            ResourceOutput::Policy { policy_id } => policy_id.clone(),
            ResourceOutput::Bucket { name, .. } => name.clone(),
            ResourceOutput::Cluster(cluster) => cluster.arn.clone(),
            ResourceOutput::Parameter { key, .. } => key.to_string(),
            ResourceOutput::Artifact(handle) => handle.arn.clone(),
            ResourceOutput::Connector { arn, .. } => arn.clone(),
            ResourceOutput::Instance { instance_id } => instance_id.clone(),
        }
    }

    /// Value of a named attribute, if this output has it
    pub fn attribute(&self, attribute: OutputAttribute) -> Option<String> {
        match (attribute, self) {
            (OutputAttribute::PhysicalId, output) => Some(output.physical_id()),
            (OutputAttribute::BootstrapAddress, ResourceOutput::Cluster(cluster)) => {
                Some(cluster.bootstrap.to_string())
            }
            (OutputAttribute::SecurityGroupId, ResourceOutput::Cluster(cluster)) => {
                Some(cluster.security_group_id.clone())
            }
            (OutputAttribute::SecurityGroupId, ResourceOutput::SecurityGroup { group_id }) => {
                Some(group_id.clone())
            }
            (OutputAttribute::Arn, ResourceOutput::Identity { arn, .. })
            | (OutputAttribute::Arn, ResourceOutput::Bucket { arn, .. })
            | (OutputAttribute::Arn, ResourceOutput::Connector { arn, .. }) => Some(arn.clone()),
            (OutputAttribute::Arn, ResourceOutput::Cluster(cluster)) => Some(cluster.arn.clone()),
            (OutputAttribute::Arn, ResourceOutput::Artifact(handle)) => Some(handle.to_string()),
            (OutputAttribute::Value, ResourceOutput::Parameter { value, .. }) => Some(value.clone()),
            _ => None,
        }
    }
}

/// Attribute a unit output exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputAttribute {
    PhysicalId,
    Arn,
    BootstrapAddress,
    SecurityGroupId,
    Value,
}

/// Named output of a deployment unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitOutput {
    pub resource: ResourceId,
    pub attribute: OutputAttribute,
}

/// Outputs of the resources applied so far in a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outputs {
    resolved: BTreeMap<ResourceId, ResourceOutput>,
}

impl Outputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ResourceId, output: ResourceOutput) {
        self.resolved.insert(id, output);
    }

    pub fn get(&self, id: &ResourceId) -> Option<&ResourceOutput> {
        self.resolved.get(id)
    }

    /// Output of `prerequisite`, as needed by `requester`
    pub fn require(
        &self,
        requester: &ResourceId,
        prerequisite: &ResourceId,
    ) -> ProvisioningResult<&ResourceOutput> {
        self.resolved
            .get(prerequisite)
            .ok_or_else(|| ProvisioningError::unresolved(requester, prerequisite.to_string()))
    }

    pub fn fabric(&self, requester: &ResourceId, id: &ResourceId) -> ProvisioningResult<&FabricHandle> {
        match self.require(requester, id)? {
            ResourceOutput::Fabric(handle) => Ok(handle),
            other => Err(wrong_kind(requester, id, ResourceKind::Fabric, other)),
        }
    }

    pub fn cluster(&self, requester: &ResourceId, id: &ResourceId) -> ProvisioningResult<&ClusterOutput> {
        match self.require(requester, id)? {
            ResourceOutput::Cluster(cluster) => Ok(cluster),
            other => Err(wrong_kind(requester, id, ResourceKind::Cluster, other)),
        }
    }

    pub fn artifact(&self, requester: &ResourceId, id: &ResourceId) -> ProvisioningResult<&ArtifactHandle> {
        match self.require(requester, id)? {
            ResourceOutput::Artifact(handle) => Ok(handle),
            other => Err(wrong_kind(requester, id, ResourceKind::Artifact, other)),
        }
    }

    /// `(name, arn)` of an identity
    pub fn identity(&self, requester: &ResourceId, id: &ResourceId) -> ProvisioningResult<(&str, &str)> {
        match self.require(requester, id)? {
            ResourceOutput::Identity { name, arn } => Ok((name.as_str(), arn.as_str())),
            other => Err(wrong_kind(requester, id, ResourceKind::Identity, other)),
        }
    }

    pub fn security_group(&self, requester: &ResourceId, id: &ResourceId) -> ProvisioningResult<&str> {
        match self.require(requester, id)? {
            ResourceOutput::SecurityGroup { group_id } => Ok(group_id.as_str()),
            other => Err(wrong_kind(requester, id, ResourceKind::SecurityGroup, other)),
        }
    }

    pub fn bucket_name(&self, requester: &ResourceId, id: &ResourceId) -> ProvisioningResult<&str> {
        match self.require(requester, id)? {
            ResourceOutput::Bucket { name, .. } => Ok(name.as_str()),
            other => Err(wrong_kind(requester, id, ResourceKind::Bucket, other)),
        }
    }
}

fn wrong_kind(
    requester: &ResourceId,
    id: &ResourceId,
    expected: ResourceKind,
    found: &ResourceOutput,
) -> ProvisioningError {
    ProvisioningError::configuration(
        requester,
        format!("{} is a {}, expected a {}", id, found.kind(), expected),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_output() -> ResourceOutput {
        ResourceOutput::Cluster(ClusterOutput {
            arn: "arn:cluster".to_string(),
            bootstrap: BootstrapAddress::new("b-1:9094,b-2:9094"),
            security_group_id: "sg-1".to_string(),
        })
    }

    #[test]
    fn test_missing_output_is_unresolved() {
        let outputs = Outputs::new();
        let err = outputs
            .cluster(&ResourceId::new("connector"), &ResourceId::new("cluster"))
            .unwrap_err();
        assert!(matches!(err, ProvisioningError::PrerequisiteUnresolved { .. }));
    }

    #[test]
    fn test_wrong_kind_is_configuration_error() {
        let mut outputs = Outputs::new();
        outputs.insert(ResourceId::new("cluster"), cluster_output());
        let err = outputs
            .artifact(&ResourceId::new("connector"), &ResourceId::new("cluster"))
            .unwrap_err();
        assert!(matches!(err, ProvisioningError::Configuration { .. }));
    }

    #[test]
    fn test_attributes() {
        let output = cluster_output();
        assert_eq!(
            output.attribute(OutputAttribute::BootstrapAddress).as_deref(),
            Some("b-1:9094,b-2:9094")
        );
        assert_eq!(output.attribute(OutputAttribute::Value), None);
        assert_eq!(output.physical_id(), "arn:cluster");
    }
}
