// Copyright (c) 2025 - Cowboy AI, Inc.
//! Provisioning Domain Models
//!
//! Declarations for everything a deployment unit can own, plus the value
//! objects they are built from.
//!
//! # Value Objects with Invariants
//!
//! - [`Cidr`] - IPv4/IPv6 block with prefix length
//! - [`NetworkFabric`] - address space, subnets, reachability rules
//! - [`ExecutionIdentity`] - principal with additive capability grants
//! - [`ClusterSpec`] - streaming cluster (broker count >= 2)
//! - [`ArtifactRegistration`] - custom plugin keyed by a [`PhysicalId`]
//! - [`ConnectorSpec`] / [`CapacityPolicy`] - sink connector runtime
//!
//! # Declarations
//!
//! A [`Resource`] pairs a logical [`ResourceId`] with a [`Declaration`]. The
//! ids a declaration mentions are its implicit dependencies; the deployment
//! unit turns them into graph edges.

pub mod artifact;
pub mod cluster;
pub mod connector;
pub mod identity;
pub mod network;
pub mod resource;
pub mod storage;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::exchange::ParameterKey;

pub use artifact::{
    ArtifactHandle, ArtifactMetadata, ArtifactRecord, ArtifactRegistration, ContentType,
    PhysicalId, SourceLocation,
};
pub use cluster::{
    BootstrapAddress, ClusterEncryption, ClusterSpec, InstanceClass, KafkaVersion, MIN_BROKERS,
};
pub use connector::{
    AuthenticationMode, BootstrapSource, CapacityPolicy, CapacityWarning, ConnectorSpec,
    EncryptionInTransit, McuCount, S3SinkConfig, SecurityGroupSource,
};
pub use identity::{
    connector_identity, connector_service_grant, log_delivery_grant, network_interface_grant,
    session_host_identity, storage_grant, CapabilityGrant, ConnectorPolicyOptions, Effect,
    ExecutionIdentity, GrantCondition, ServicePrincipal, StorageAccess, CONNECTOR_MANAGED_TAG,
    SESSION_MANAGER_POLICY,
};
pub use network::{
    Cidr, FabricHandle, FabricSource, NetworkFabric, PortRange, Protocol, ReachabilityRule,
    SecurityGroupSpec, Subnet, SubnetHandle, SubnetKind, TrafficSource,
};
pub use resource::{RemovalPolicy, ResourceId, ResourceKind};
pub use storage::{BucketSpec, SessionInstanceSpec, UserData};

/// Security group bound to a fabric
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupDeclaration {
    pub fabric: ResourceId,
    pub spec: SecurityGroupSpec,
}

/// Bucket access granted through a policy; the bucket name is resolved at
/// deploy time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageGrant {
    pub bucket: ResourceId,
    pub prefix: String,
    pub access: StorageAccess,
}

/// Grants attached to an identity declared elsewhere in the unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyAttachment {
    pub name: String,
    pub identity: ResourceId,
    pub grants: Vec<CapabilityGrant>,
    pub storage: Vec<StorageGrant>,
}

/// Value a unit publishes to the exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "value", rename_all = "snake_case")]
pub enum ParameterValue {
    /// Bootstrap address of a cluster in the same unit
    ClusterBootstrap(ResourceId),
    /// Security group id of a cluster in the same unit
    ClusterSecurityGroup(ResourceId),
    Literal(String),
}

/// Named parameter written to the exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDeclaration {
    pub key: ParameterKey,
    pub value: ParameterValue,
}

/// Everything a deployment unit can declare
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "spec", rename_all = "snake_case")]
pub enum Declaration {
    Fabric(FabricSource),
    SecurityGroup(SecurityGroupDeclaration),
    Identity(ExecutionIdentity),
    Policy(PolicyAttachment),
    Bucket(BucketSpec),
    Cluster(ClusterSpec),
    Parameter(ParameterDeclaration),
    Artifact(ArtifactRegistration),
    Connector(ConnectorSpec),
    Instance(SessionInstanceSpec),
}

impl Declaration {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Declaration::Fabric(_) => ResourceKind::Fabric,
            Declaration::SecurityGroup(_) => ResourceKind::SecurityGroup,
            Declaration::Identity(_) => ResourceKind::Identity,
            Declaration::Policy(_) => ResourceKind::Policy,
            Declaration::Bucket(_) => ResourceKind::Bucket,
            Declaration::Cluster(_) => ResourceKind::Cluster,
            Declaration::Parameter(_) => ResourceKind::Parameter,
            Declaration::Artifact(_) => ResourceKind::Artifact,
            Declaration::Connector(_) => ResourceKind::Connector,
            Declaration::Instance(_) => ResourceKind::Instance,
        }
    }

    /// Same-unit resources whose outputs this declaration reads
    ///
    /// Values read through the exchange are not references.
    pub fn references(&self) -> Vec<ResourceId> {
        match self {
            Declaration::Fabric(_)
            | Declaration::Identity(_)
            | Declaration::Bucket(_)
            | Declaration::Artifact(_) => Vec::new(),
            Declaration::SecurityGroup(group) => vec![group.fabric.clone()],
            Declaration::Policy(policy) => std::iter::once(policy.identity.clone())
                .chain(policy.storage.iter().map(|s| s.bucket.clone()))
                .collect(),
            Declaration::Cluster(cluster) => vec![cluster.fabric.clone()],
            Declaration::Parameter(parameter) => match &parameter.value {
                ParameterValue::ClusterBootstrap(id) | ParameterValue::ClusterSecurityGroup(id) => {
                    vec![id.clone()]
                }
                ParameterValue::Literal(_) => Vec::new(),
            },
            Declaration::Connector(connector) => connector.references(),
            Declaration::Instance(instance) => vec![
                instance.fabric.clone(),
                instance.security_group.clone(),
                instance.identity.clone(),
            ],
        }
    }

    /// Local validation, run before any control-plane call
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Declaration::Fabric(FabricSource::Owned(fabric)) => fabric.validate(),
            Declaration::Fabric(FabricSource::Lookup { name }) => {
                if name.trim().is_empty() {
                    Err(ConfigError::invalid("fabric.name", "must not be empty"))
                } else {
                    Ok(())
                }
            }
            Declaration::SecurityGroup(group) => {
                if group.spec.name.trim().is_empty() {
                    Err(ConfigError::invalid("security_group.name", "must not be empty"))
                } else {
                    Ok(())
                }
            }
            Declaration::Identity(identity) => identity.validate(),
            Declaration::Policy(policy) => {
                if policy.grants.is_empty() && policy.storage.is_empty() {
                    Err(ConfigError::invalid("policy.grants", "policy grants nothing"))
                } else {
                    Ok(())
                }
            }
            Declaration::Bucket(bucket) => bucket.validate(),
            Declaration::Cluster(cluster) => cluster.validate(),
            Declaration::Parameter(_) => Ok(()),
            Declaration::Artifact(artifact) => artifact.validate(),
            Declaration::Connector(connector) => connector.validate(),
            Declaration::Instance(instance) => instance.validate(),
        }
    }

    /// Whether destroying the unit deletes this resource
    pub fn removal_policy(&self) -> RemovalPolicy {
        match self {
            Declaration::Bucket(bucket) => bucket.removal_policy,
            Declaration::Cluster(cluster) => cluster.removal_policy,
            _ => RemovalPolicy::Destroy,
        }
    }

    /// Whether the unit creates this resource (as opposed to reading it)
    pub fn is_owned(&self) -> bool {
        !matches!(self, Declaration::Fabric(FabricSource::Lookup { .. }))
    }
}

/// A declaration addressed by its logical id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub declaration: Declaration,
}

impl Resource {
    pub fn new(id: impl Into<ResourceId>, declaration: Declaration) -> Self {
        Self {
            id: id.into(),
            declaration,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.declaration.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_policy_references_identity_and_buckets() {
        let policy = Declaration::Policy(PolicyAttachment {
            name: "sink-write".to_string(),
            identity: ResourceId::new("role"),
            grants: Vec::new(),
            storage: vec![StorageGrant {
                bucket: ResourceId::new("bucket"),
                prefix: String::new(),
                access: StorageAccess::Write,
            }],
        });

        assert_eq!(
            policy.references(),
            vec![ResourceId::new("role"), ResourceId::new("bucket")]
        );
        assert_eq!(policy.kind(), ResourceKind::Policy);
    }

    #[test]
    fn test_lookup_fabric_is_not_owned() {
        let lookup = Declaration::Fabric(FabricSource::Lookup {
            name: "msk-vpc".to_string(),
        });
        assert!(!lookup.is_owned());
        assert!(lookup.references().is_empty());
    }

    #[test]
    fn test_literal_parameter_has_no_references() {
        let parameter = Declaration::Parameter(ParameterDeclaration {
            key: ParameterKey::new("/msk/region").unwrap(),
            value: ParameterValue::Literal("us-east-1".to_string()),
        });
        assert!(parameter.references().is_empty());
    }

    #[test]
    fn test_empty_policy_rejected() {
        let policy = Declaration::Policy(PolicyAttachment {
            name: "empty".to_string(),
            identity: ResourceId::new("role"),
            grants: Vec::new(),
            storage: Vec::new(),
        });
        assert!(policy.validate().is_err());
    }
}
