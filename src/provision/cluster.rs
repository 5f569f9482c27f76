// Copyright (c) 2025 - Cowboy AI, Inc.
//! Streaming cluster provisioning
//!
//! Creation returns immediately with the cluster ARN; the bootstrap address
//! only exists once the control plane reports the cluster active, so
//! [`ClusterProvisioner::await_ready`] polls for it. The ingress rule from
//! the fabric's address space to the listener port is part of the create
//! request and goes away with the cluster.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::ReadinessPolicy;
use crate::control_plane::{ClusterRequest, ClusterState, ControlPlane};
use crate::domain::{ClusterSpec, FabricHandle, ReachabilityRule, ResourceId, SubnetKind};
use crate::errors::{ProvisioningError, ProvisioningResult};
use crate::retry::{call_with_retry, retry_transient, RetryPolicy};
use crate::stack::ClusterOutput;

pub struct ClusterProvisioner<C: ControlPlane + ?Sized> {
    control_plane: Arc<C>,
    retry: RetryPolicy,
    readiness: ReadinessPolicy,
}

impl<C: ControlPlane + ?Sized> ClusterProvisioner<C> {
    pub fn new(control_plane: Arc<C>, retry: RetryPolicy, readiness: ReadinessPolicy) -> Self {
        Self {
            control_plane,
            retry,
            readiness,
        }
    }

    /// Create request for `spec`, placed in the fabric's private subnets
    pub fn build_request(spec: &ClusterSpec, fabric: &FabricHandle) -> ClusterRequest {
        let port = spec.encryption.listener_port();
        ClusterRequest {
            name: spec.name.clone(),
            broker_count: spec.broker_count,
            kafka_version: spec.kafka_version.clone(),
            instance_class: spec.instance_class.clone(),
            subnet_ids: fabric.subnet_ids(SubnetKind::Private),
            encryption: spec.encryption,
            ingress: vec![ReachabilityRule::tcp_from(
                fabric.address_space,
                port,
                format!("Allow connections from {}", fabric.name),
            )],
        }
    }

    /// Issue the create call; returns the cluster ARN
    pub async fn create(
        &self,
        resource: &ResourceId,
        request: &ClusterRequest,
    ) -> ProvisioningResult<String> {
        if request.subnet_ids.is_empty() {
            return Err(ProvisioningError::configuration(
                resource,
                "fabric has no private subnets for the brokers",
            ));
        }
        let cp = self.control_plane.as_ref();
        let arn = call_with_retry(&self.retry, resource, "create_cluster", move || {
            cp.create_cluster(request)
        })
        .await?;
        info!(
            resource = %resource,
            cluster = %request.name,
            brokers = request.broker_count,
            arn = %arn,
            "Cluster creation started"
        );
        Ok(arn)
    }

    /// Poll until the cluster is active
    ///
    /// A cluster still creating when the policy runs out is reported as an
    /// unresolved prerequisite so that a later run resumes the wait.
    pub async fn await_ready(
        &self,
        resource: &ResourceId,
        arn: &str,
    ) -> ProvisioningResult<ClusterOutput> {
        let cp = self.control_plane.as_ref();
        let max_polls = self.readiness.max_polls.max(1);
        for poll in 1..=max_polls {
            let state = call_with_retry(&self.retry, resource, "describe_cluster", move || {
                cp.describe_cluster(arn)
            })
            .await?;

            match state {
                ClusterState::Active {
                    bootstrap,
                    security_group_id,
                } => {
                    info!(
                        resource = %resource,
                        arn,
                        bootstrap = %bootstrap,
                        polls = poll,
                        "Cluster is active"
                    );
                    return Ok(ClusterOutput {
                        arn: arn.to_string(),
                        bootstrap,
                        security_group_id,
                    });
                }
                ClusterState::Failed { reason } => {
                    return Err(ProvisioningError::ControlPlaneRejected {
                        resource: resource.clone(),
                        operation: "create_cluster".to_string(),
                        reason,
                    });
                }
                ClusterState::Creating => {
                    debug!(resource = %resource, arn, poll, "Cluster still creating");
                    if poll < max_polls {
                        tokio::time::sleep(self.readiness.poll_interval).await;
                    }
                }
            }
        }

        warn!(
            resource = %resource,
            arn,
            max_polls = self.readiness.max_polls,
            "Cluster did not become active in time"
        );
        Err(ProvisioningError::unresolved(
            resource,
            format!("bootstrap address of cluster {}", arn),
        ))
    }

    /// Create and wait for readiness
    pub async fn provision(
        &self,
        resource: &ResourceId,
        spec: &ClusterSpec,
        fabric: &FabricHandle,
    ) -> ProvisioningResult<ClusterOutput> {
        let request = Self::build_request(spec, fabric);
        let arn = self.create(resource, &request).await?;
        self.await_ready(resource, &arn).await
    }

    /// Delete the cluster; one that no longer exists counts as deleted
    pub async fn delete(&self, resource: &ResourceId, arn: &str) -> ProvisioningResult<()> {
        let cp = self.control_plane.as_ref();
        match retry_transient(&self.retry, "delete_cluster", move || cp.delete_cluster(arn)).await {
            Ok(()) => {
                info!(resource = %resource, arn, "Deleted cluster");
                Ok(())
            }
            Err(failure) if failure.error.is_not_found() => {
                debug!(resource = %resource, arn, "Cluster already gone");
                Ok(())
            }
            Err(failure) => Err(failure.into_provisioning(resource, "delete_cluster")),
        }
    }
}
