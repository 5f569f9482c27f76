// Copyright (c) 2025 - Cowboy AI, Inc.
//! Sink connector provisioning
//!
//! The bootstrap address and artifact handle are hard prerequisites: they
//! are resolved (from same-unit outputs or the value exchange) before the
//! connector declaration is sent, and a missing one aborts without any
//! control-plane call.

use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::resolve_parameter;
use crate::control_plane::{ConnectorRequest, ControlPlane};
use crate::domain::{
    BootstrapAddress, BootstrapSource, ConnectorSpec, ResourceId, SecurityGroupSource,
    SubnetKind,
};
use crate::errors::{ProvisioningError, ProvisioningResult};
use crate::exchange::ValueExchange;
use crate::retry::{call_with_retry, retry_transient, RetryPolicy};
use crate::stack::Outputs;

pub struct ConnectorProvisioner<C: ControlPlane + ?Sized, X: ValueExchange + ?Sized> {
    control_plane: Arc<C>,
    exchange: Arc<X>,
    retry: RetryPolicy,
}

impl<C, X> ConnectorProvisioner<C, X>
where
    C: ControlPlane + ?Sized,
    X: ValueExchange + ?Sized,
{
    pub fn new(control_plane: Arc<C>, exchange: Arc<X>, retry: RetryPolicy) -> Self {
        Self {
            control_plane,
            exchange,
            retry,
        }
    }

    /// Validate `spec` and resolve every reference into a request
    ///
    /// Makes no control-plane calls.
    pub async fn resolve(
        &self,
        resource: &ResourceId,
        spec: &ConnectorSpec,
        outputs: &Outputs,
    ) -> ProvisioningResult<ConnectorRequest> {
        spec.validate()
            .map_err(|e| ProvisioningError::configuration(resource, e))?;
        for warning in spec.capacity.warnings() {
            warn!(resource = %resource, connector = %spec.name, "Suspicious capacity policy: {}", warning);
        }

        let (bootstrap, security_group_ids) = futures::try_join!(
            self.resolve_bootstrap(resource, &spec.bootstrap, outputs),
            self.resolve_security_groups(resource, &spec.security_groups, outputs),
        )?;

        let artifact = outputs.artifact(resource, &spec.artifact)?.clone();
        let (_, role_arn) = outputs.identity(resource, &spec.identity)?;
        let subnet_ids = outputs
            .fabric(resource, &spec.fabric)?
            .subnet_ids(SubnetKind::Private);
        if subnet_ids.is_empty() {
            return Err(ProvisioningError::configuration(
                resource,
                format!("fabric {} has no private subnets", spec.fabric),
            ));
        }

        debug!(
            resource = %resource,
            artifact = %artifact,
            brokers = bootstrap.brokers().count(),
            "Resolved connector prerequisites"
        );

        Ok(ConnectorRequest {
            name: spec.name.clone(),
            kafka_connect_version: spec.kafka_connect_version.clone(),
            bootstrap,
            artifact,
            execution_role_arn: role_arn.to_string(),
            subnet_ids,
            security_group_ids,
            authentication: spec.authentication,
            encryption: spec.encryption,
            capacity: spec.capacity.clone(),
            configuration: spec.configuration.clone(),
            worker_log_group: spec.worker_log_group.clone(),
        })
    }

    async fn resolve_bootstrap(
        &self,
        resource: &ResourceId,
        source: &BootstrapSource,
        outputs: &Outputs,
    ) -> ProvisioningResult<BootstrapAddress> {
        match source {
            BootstrapSource::Direct(cluster) => {
                Ok(outputs.cluster(resource, cluster)?.bootstrap.clone())
            }
            BootstrapSource::Parameter(key) => {
                let value = resolve_parameter(self.exchange.as_ref(), resource, key).await?;
                let address = BootstrapAddress::new(value);
                if address.brokers().next().is_none() {
                    return Err(ProvisioningError::configuration(
                        resource,
                        format!("parameter {} holds no broker addresses", key),
                    ));
                }
                Ok(address)
            }
        }
    }

    async fn resolve_security_groups(
        &self,
        resource: &ResourceId,
        sources: &[SecurityGroupSource],
        outputs: &Outputs,
    ) -> ProvisioningResult<Vec<String>> {
        try_join_all(sources.iter().map(|source| async move {
            match source {
                SecurityGroupSource::Declared(id) => {
                    outputs.security_group(resource, id).map(str::to_string)
                }
                SecurityGroupSource::ClusterOf(id) => outputs
                    .cluster(resource, id)
                    .map(|cluster| cluster.security_group_id.clone()),
                SecurityGroupSource::Parameter(key) => {
                    resolve_parameter(self.exchange.as_ref(), resource, key).await
                }
                SecurityGroupSource::Literal(group_id) => {
                    info!(resource = %resource, group_id = %group_id, "Using literal security group");
                    Ok(group_id.clone())
                }
            }
        }))
        .await
    }

    /// Create the connector; returns its ARN
    pub async fn create(
        &self,
        resource: &ResourceId,
        request: &ConnectorRequest,
    ) -> ProvisioningResult<String> {
        let cp = self.control_plane.as_ref();
        let arn = call_with_retry(&self.retry, resource, "create_connector", move || {
            cp.create_connector(request)
        })
        .await?;
        info!(
            resource = %resource,
            connector = %request.name,
            artifact = %request.artifact,
            arn = %arn,
            "Created connector"
        );
        Ok(arn)
    }

    /// Re-declare an existing connector, e.g. to bind a new artifact revision
    pub async fn update(
        &self,
        resource: &ResourceId,
        arn: &str,
        request: &ConnectorRequest,
    ) -> ProvisioningResult<()> {
        let cp = self.control_plane.as_ref();
        call_with_retry(&self.retry, resource, "update_connector", move || {
            cp.update_connector(arn, request)
        })
        .await?;
        info!(
            resource = %resource,
            arn,
            artifact = %request.artifact,
            "Updated connector"
        );
        Ok(())
    }

    /// Delete the connector; one that no longer exists counts as deleted
    pub async fn delete(&self, resource: &ResourceId, arn: &str) -> ProvisioningResult<()> {
        let cp = self.control_plane.as_ref();
        match retry_transient(&self.retry, "delete_connector", move || cp.delete_connector(arn))
            .await
        {
            Ok(()) => {
                info!(resource = %resource, arn, "Deleted connector");
                Ok(())
            }
            Err(failure) if failure.error.is_not_found() => {
                debug!(resource = %resource, arn, "Connector already gone");
                Ok(())
            }
            Err(failure) => Err(failure.into_provisioning(resource, "delete_connector")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_plane::InMemoryControlPlane;
    use crate::domain::{
        ArtifactHandle, AuthenticationMode, CapacityPolicy, EncryptionInTransit, FabricHandle,
        McuCount, S3SinkConfig, SubnetHandle,
    };
    use crate::exchange::{InMemoryValueExchange, ParameterKey};
    use crate::stack::ResourceOutput;
    use pretty_assertions::assert_eq;

    fn spec(bootstrap: BootstrapSource) -> ConnectorSpec {
        ConnectorSpec {
            name: "s3SinkConnector".to_string(),
            kafka_connect_version: "2.7.1".to_string(),
            bootstrap,
            artifact: ResourceId::new("plugin"),
            identity: ResourceId::new("role"),
            fabric: ResourceId::new("vpc"),
            security_groups: vec![SecurityGroupSource::Literal("sg-literal".to_string())],
            authentication: AuthenticationMode::None,
            encryption: EncryptionInTransit::Plaintext,
            capacity: CapacityPolicy::default(),
            configuration: S3SinkConfig::new(vec!["nicks_topic".into()], "us-east-1", "sink")
                .to_configuration(),
            worker_log_group: None,
        }
    }

    fn outputs() -> Outputs {
        let mut outputs = Outputs::new();
        outputs.insert(
            ResourceId::new("plugin"),
            ResourceOutput::Artifact(ArtifactHandle {
                arn: "arn:plugin".to_string(),
                revision: 1,
            }),
        );
        outputs.insert(
            ResourceId::new("role"),
            ResourceOutput::Identity {
                name: "connector-role".to_string(),
                arn: "arn:aws:iam::1:role/connector-role".to_string(),
            },
        );
        outputs.insert(
            ResourceId::new("vpc"),
            ResourceOutput::Fabric(FabricHandle {
                fabric_id: "vpc-1".to_string(),
                name: "msk-vpc".to_string(),
                address_space: "10.0.0.0/16".parse().unwrap(),
                subnets: vec![SubnetHandle {
                    subnet_id: "subnet-private".to_string(),
                    kind: SubnetKind::Private,
                    availability_zone: "us-east-1a".to_string(),
                    cidr: "10.0.128.0/18".parse().unwrap(),
                }],
            }),
        );
        outputs
    }

    fn provisioner(
        exchange: InMemoryValueExchange,
    ) -> ConnectorProvisioner<InMemoryControlPlane, InMemoryValueExchange> {
        ConnectorProvisioner::new(
            Arc::new(InMemoryControlPlane::new("us-east-1", "123456789012")),
            Arc::new(exchange),
            RetryPolicy::immediate(2),
        )
    }

    #[tokio::test]
    async fn test_resolves_bootstrap_from_exchange() {
        let exchange = InMemoryValueExchange::new();
        let key = ParameterKey::new("/msk/bootstrap-brokers").unwrap();
        exchange.publish(&key, "b-1:9094,b-2:9094").await.unwrap();
        let provisioner = provisioner(exchange);

        let request = provisioner
            .resolve(
                &ResourceId::new("connector"),
                &spec(BootstrapSource::Parameter(key)),
                &outputs(),
            )
            .await
            .unwrap();

        assert_eq!(request.bootstrap.as_str(), "b-1:9094,b-2:9094");
        assert_eq!(request.subnet_ids, vec!["subnet-private".to_string()]);
        assert_eq!(request.security_group_ids, vec!["sg-literal".to_string()]);
        assert_eq!(request.capacity.mcu_count, McuCount::Two);
    }

    #[tokio::test]
    async fn test_unpublished_bootstrap_is_unresolved() {
        let provisioner = provisioner(InMemoryValueExchange::new());
        let key = ParameterKey::new("/msk/bootstrap-brokers").unwrap();

        let err = provisioner
            .resolve(
                &ResourceId::new("connector"),
                &spec(BootstrapSource::Parameter(key)),
                &outputs(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisioningError::PrerequisiteUnresolved { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_exchange_is_not_unresolved() {
        let exchange = InMemoryValueExchange::new();
        exchange.set_offline(true);
        let provisioner = provisioner(exchange);
        let key = ParameterKey::new("/msk/bootstrap-brokers").unwrap();

        let err = provisioner
            .resolve(
                &ResourceId::new("connector"),
                &spec(BootstrapSource::Parameter(key)),
                &outputs(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisioningError::Exchange { .. }));
    }

    #[tokio::test]
    async fn test_missing_artifact_output_is_unresolved() {
        let exchange = InMemoryValueExchange::new();
        let key = ParameterKey::new("/msk/bootstrap-brokers").unwrap();
        exchange.publish(&key, "b-1:9094").await.unwrap();
        let provisioner = provisioner(exchange);
        let mut outputs = Outputs::new();
        outputs.insert(
            ResourceId::new("role"),
            ResourceOutput::Identity {
                name: "r".to_string(),
                arn: "arn:r".to_string(),
            },
        );

        let err = provisioner
            .resolve(
                &ResourceId::new("connector"),
                &spec(BootstrapSource::Parameter(key)),
                &outputs,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisioningError::PrerequisiteUnresolved { .. }));
    }
}
