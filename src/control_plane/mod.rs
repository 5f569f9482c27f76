// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cloud Control Plane Port
//!
//! The provider's resource APIs, reduced to what the provisioners request.
//! Implementations own the wire protocol; this crate only relies on the
//! request/response shapes below and on the error classification in
//! [`ControlPlaneError`].
//!
//! # Contract
//!
//! - Calls are long-running and may fail transiently; callers retry
//!   [`ControlPlaneError::is_transient`] errors with backoff
//! - `describe_cluster` reports readiness; the bootstrap address exists only
//!   in [`ClusterState::Active`]
//! - Artifacts are registered imperatively and never deleted implicitly;
//!   `deregister_artifact` of an unknown artifact returns `NotFound`
//! - Every `delete_*` call returns `NotFound` for resources that are gone

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::domain::{
    ArtifactHandle, ArtifactRecord, ArtifactRegistration, AuthenticationMode, BootstrapAddress,
    BucketSpec, CapabilityGrant, CapacityPolicy, ClusterEncryption, EncryptionInTransit,
    ExecutionIdentity, FabricHandle, InstanceClass, KafkaVersion, NetworkFabric,
    ReachabilityRule, SecurityGroupSpec, UserData,
};

pub use memory::{ControlPlaneCall, InMemoryControlPlane};

/// What a control-plane call can report
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlPlaneError {
    /// Request rate exceeded
    #[error("Throttled: {0}")]
    Throttled(String),

    /// Network or service hiccup
    #[error("Transient failure: {0}")]
    Transient(String),

    /// The provider refused the requested configuration
    #[error("Rejected: {0}")]
    Rejected(String),

    /// The addressed resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller lacks a permission the call needs
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// The request clashes with an existing resource
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl ControlPlaneError {
    /// Whether retrying the same call can succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ControlPlaneError::Throttled(_) | ControlPlaneError::Transient(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ControlPlaneError::NotFound(_))
    }
}

/// Cluster as it should be created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRequest {
    pub name: String,
    pub broker_count: u32,
    pub kafka_version: KafkaVersion,
    pub instance_class: InstanceClass,
    pub subnet_ids: Vec<String>,
    pub encryption: ClusterEncryption,
    /// Rules on the cluster's own security group
    pub ingress: Vec<ReachabilityRule>,
}

/// Cluster provisioning status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterState {
    Creating,
    Active {
        bootstrap: BootstrapAddress,
        security_group_id: String,
    },
    Failed {
        reason: String,
    },
}

/// Policy document attached to a named identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRequest {
    pub name: String,
    pub identity_name: String,
    pub grants: Vec<CapabilityGrant>,
}

/// Connector with every reference resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorRequest {
    pub name: String,
    pub kafka_connect_version: String,
    pub bootstrap: BootstrapAddress,
    pub artifact: ArtifactHandle,
    pub execution_role_arn: String,
    pub subnet_ids: Vec<String>,
    pub security_group_ids: Vec<String>,
    pub authentication: AuthenticationMode,
    pub encryption: EncryptionInTransit,
    pub capacity: CapacityPolicy,
    pub configuration: BTreeMap<String, String>,
    pub worker_log_group: Option<String>,
}

/// Session-access instance launch parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRequest {
    pub name: String,
    pub instance_class: InstanceClass,
    pub machine_image: String,
    pub subnet_id: String,
    pub security_group_id: String,
    pub role_arn: String,
    pub user_data: UserData,
}

/// Provider resource APIs used by the provisioners
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn create_fabric(&self, fabric: &NetworkFabric) -> Result<FabricHandle, ControlPlaneError>;

    /// Resolve an existing fabric by name
    async fn lookup_fabric(&self, name: &str) -> Result<FabricHandle, ControlPlaneError>;

    async fn delete_fabric(&self, fabric_id: &str) -> Result<(), ControlPlaneError>;

    async fn create_security_group(
        &self,
        fabric_id: &str,
        spec: &SecurityGroupSpec,
    ) -> Result<String, ControlPlaneError>;

    async fn delete_security_group(&self, group_id: &str) -> Result<(), ControlPlaneError>;

    /// Create or update an identity; returns its ARN
    async fn put_identity(&self, identity: &ExecutionIdentity) -> Result<String, ControlPlaneError>;

    async fn delete_identity(&self, name: &str) -> Result<(), ControlPlaneError>;

    /// Create or replace a policy; returns its id
    async fn put_policy(&self, request: &PolicyRequest) -> Result<String, ControlPlaneError>;

    async fn delete_policy(&self, policy_id: &str) -> Result<(), ControlPlaneError>;

    /// Returns the bucket ARN
    async fn create_bucket(&self, spec: &BucketSpec) -> Result<String, ControlPlaneError>;

    /// Delete a bucket, emptying it first when `empty_first` is set
    async fn delete_bucket(&self, name: &str, empty_first: bool) -> Result<(), ControlPlaneError>;

    /// Start cluster creation; returns the cluster ARN immediately
    async fn create_cluster(&self, request: &ClusterRequest) -> Result<String, ControlPlaneError>;

    async fn describe_cluster(&self, cluster_arn: &str) -> Result<ClusterState, ControlPlaneError>;

    async fn delete_cluster(&self, cluster_arn: &str) -> Result<(), ControlPlaneError>;

    /// Current registration under a physical id, if any
    async fn describe_artifact(
        &self,
        physical_id: &str,
    ) -> Result<Option<ArtifactRecord>, ControlPlaneError>;

    /// Register (or re-register) an artifact under its physical id
    async fn register_artifact(
        &self,
        registration: &ArtifactRegistration,
    ) -> Result<ArtifactHandle, ControlPlaneError>;

    async fn deregister_artifact(&self, artifact_arn: &str) -> Result<(), ControlPlaneError>;

    /// Returns the connector ARN
    async fn create_connector(&self, request: &ConnectorRequest) -> Result<String, ControlPlaneError>;

    async fn update_connector(
        &self,
        connector_arn: &str,
        request: &ConnectorRequest,
    ) -> Result<(), ControlPlaneError>;

    async fn delete_connector(&self, connector_arn: &str) -> Result<(), ControlPlaneError>;

    /// Returns the instance id
    async fn launch_instance(&self, request: &InstanceRequest) -> Result<String, ControlPlaneError>;

    async fn terminate_instance(&self, instance_id: &str) -> Result<(), ControlPlaneError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ControlPlaneError::Throttled("rate".into()).is_transient());
        assert!(ControlPlaneError::Transient("reset".into()).is_transient());
        assert!(!ControlPlaneError::AccessDenied("s3:GetObject".into()).is_transient());
        assert!(!ControlPlaneError::Conflict("plugin".into()).is_transient());
        assert!(ControlPlaneError::NotFound("x".into()).is_not_found());
    }
}
