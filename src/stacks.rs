// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deployment Unit Blueprints
//!
//! The two units this crate ships:
//!
//! - [`streaming_cluster_unit`] - fabric, cluster, session-access host, and
//!   the parameters the connector unit reads
//! - [`sink_connector_unit`] - sink bucket, connector identity, custom plugin
//!   and the sink connector itself
//!
//! The units never share in-memory references. The connector unit binds to
//! the cluster unit's fabric by name and reads the bootstrap address and the
//! cluster security group through the value exchange, so the cluster unit
//! must be deployed first.
//!
//! ```rust
//! use msk_connect_infrastructure::config::TargetContext;
//! use msk_connect_infrastructure::stacks::{
//!     sink_connector_unit, streaming_cluster_unit, ClusterUnitOptions, ConnectorUnitOptions,
//! };
//!
//! let target = TargetContext::new("us-east-1", "123456789012");
//! let cluster = streaming_cluster_unit(&target, &ClusterUnitOptions::default()).unwrap();
//! let connector = sink_connector_unit(&target, &ConnectorUnitOptions::default()).unwrap();
//!
//! assert!(cluster.validate().is_ok());
//! assert!(connector.validate().is_ok());
//! ```

use crate::config::TargetContext;
use crate::domain::{
    connector_identity, session_host_identity, ArtifactMetadata, ArtifactRegistration,
    AuthenticationMode, BootstrapSource, BucketSpec, CapacityPolicy, Cidr, ClusterEncryption,
    ClusterSpec, ConnectorPolicyOptions, ConnectorSpec, ContentType, Declaration,
    EncryptionInTransit, FabricSource, InstanceClass, KafkaVersion, NetworkFabric,
    ParameterDeclaration, ParameterValue, PhysicalId, PolicyAttachment, RemovalPolicy,
    S3SinkConfig, SecurityGroupDeclaration, SecurityGroupSource, SecurityGroupSpec,
    SessionInstanceSpec, SourceLocation, StorageAccess, StorageGrant, SubnetKind, UserData,
};
use crate::errors::ConfigError;
use crate::exchange::ParameterKey;
use crate::stack::{DeploymentUnit, OutputAttribute};

/// Exchange key carrying the cluster's bootstrap address
pub const BOOTSTRAP_PARAMETER: &str = "/msk/bootstrap-brokers";

/// Exchange key carrying the cluster's security group id
pub const CLUSTER_SECURITY_GROUP_PARAMETER: &str = "/msk/cluster-security-group";

/// Name both units use for the shared fabric
pub const FABRIC_NAME: &str = "msk-vpc";

/// Bucket holding the connector plugin archive
pub const PLUGIN_BUCKET: &str = "msk-connect-plugin-bucket";

/// Plugin archive key
pub const PLUGIN_KEY: &str = "confluentinc-kafka-connect-s3-10.4.2.zip";

/// Stable identity of the custom plugin
pub const PLUGIN_PHYSICAL_ID: &str = "customConnectorPlugin";

/// Unit output holding the bootstrap address
pub const BOOTSTRAP_OUTPUT: &str = "msk-brokers-out";

const SESSION_HOST_USER_DATA: &str = "#!/bin/bash
yum update -y
yum install -y java-11-amazon-corretto-headless
cd /home/ssm-user || cd /tmp
wget -q https://archive.apache.org/dist/kafka/2.8.1/kafka_2.12-2.8.1.tgz
tar -xzf kafka_2.12-2.8.1.tgz
";

/// Knobs of the cluster unit
#[derive(Debug, Clone)]
pub struct ClusterUnitOptions {
    pub unit_name: String,
    /// CIDR notation
    pub address_space: String,
    pub availability_zones: usize,
    pub broker_count: u32,
    pub broker_class: InstanceClass,
    pub removal_policy: RemovalPolicy,
    pub session_host: bool,
    pub user_data: UserData,
}

impl Default for ClusterUnitOptions {
    fn default() -> Self {
        Self {
            unit_name: "msk-stack".to_string(),
            address_space: "10.0.0.0/16".to_string(),
            availability_zones: 2,
            broker_count: 2,
            broker_class: InstanceClass::new("kafka.t3.small"),
            removal_policy: RemovalPolicy::Destroy,
            session_host: true,
            user_data: UserData::new(SESSION_HOST_USER_DATA),
        }
    }
}

/// Knobs of the connector unit
#[derive(Debug, Clone)]
pub struct ConnectorUnitOptions {
    pub unit_name: String,
    /// Defaults to a name derived from the target account
    pub bucket_name: Option<String>,
    /// Archive key inside [`PLUGIN_BUCKET`]; a new key registers a new
    /// revision
    pub plugin_key: String,
    pub topics: Vec<String>,
    pub capacity: CapacityPolicy,
    pub policy: ConnectorPolicyOptions,
}

impl Default for ConnectorUnitOptions {
    fn default() -> Self {
        Self {
            unit_name: "msk-connect-stack".to_string(),
            bucket_name: None,
            plugin_key: PLUGIN_KEY.to_string(),
            topics: vec!["nicks_topic".to_string()],
            capacity: CapacityPolicy::default(),
            policy: ConnectorPolicyOptions::default(),
        }
    }
}

fn parameter_key(key: &str) -> Result<ParameterKey, ConfigError> {
    ParameterKey::new(key)
}

/// Fabric, streaming cluster and session-access host
pub fn streaming_cluster_unit(
    target: &TargetContext,
    options: &ClusterUnitOptions,
) -> Result<DeploymentUnit, ConfigError> {
    let mut unit = DeploymentUnit::new(options.unit_name.clone(), target.clone());

    let fabric = NetworkFabric::with_default_layout(
        FABRIC_NAME,
        Cidr::new(&options.address_space)?,
        &target.availability_zones(options.availability_zones),
    )?;
    let fabric = unit.declare("msk-vpc", Declaration::Fabric(FabricSource::Owned(fabric)));

    let cluster = unit.declare(
        "msk-cluster",
        Declaration::Cluster(ClusterSpec {
            name: "msk-cluster".to_string(),
            broker_count: options.broker_count,
            kafka_version: KafkaVersion::v2_8_1(),
            instance_class: options.broker_class.clone(),
            fabric: fabric.clone(),
            encryption: ClusterEncryption::Tls,
            removal_policy: options.removal_policy,
        }),
    );
    unit.output(BOOTSTRAP_OUTPUT, &cluster, OutputAttribute::BootstrapAddress);

    unit.declare(
        "msk-brokers-parameter",
        Declaration::Parameter(ParameterDeclaration {
            key: parameter_key(BOOTSTRAP_PARAMETER)?,
            value: ParameterValue::ClusterBootstrap(cluster.clone()),
        }),
    );
    unit.declare(
        "msk-security-group-parameter",
        Declaration::Parameter(ParameterDeclaration {
            key: parameter_key(CLUSTER_SECURITY_GROUP_PARAMETER)?,
            value: ParameterValue::ClusterSecurityGroup(cluster.clone()),
        }),
    );

    if options.session_host {
        let security_group = unit.declare(
            "instance-sg",
            Declaration::SecurityGroup(SecurityGroupDeclaration {
                fabric: fabric.clone(),
                spec: SecurityGroupSpec::egress_only(
                    "instance-sg",
                    "Allow traffic for session manager",
                ),
            }),
        );
        let identity = unit.declare(
            "instance-role",
            Declaration::Identity(session_host_identity("msk-instance-role")),
        );
        unit.declare(
            "private-instance",
            Declaration::Instance(SessionInstanceSpec {
                name: "private-instance".to_string(),
                instance_class: InstanceClass::new("t2.micro"),
                machine_image: "amazon-linux-2".to_string(),
                fabric,
                subnet_kind: SubnetKind::Private,
                security_group,
                identity,
                user_data: options.user_data.clone(),
            }),
        );
    }

    Ok(unit)
}

/// Sink bucket, plugin and the S3 sink connector
///
/// Reads [`BOOTSTRAP_PARAMETER`] and [`CLUSTER_SECURITY_GROUP_PARAMETER`]
/// at deploy time.
pub fn sink_connector_unit(
    target: &TargetContext,
    options: &ConnectorUnitOptions,
) -> Result<DeploymentUnit, ConfigError> {
    let mut unit = DeploymentUnit::new(options.unit_name.clone(), target.clone());
    let bucket_name = options
        .bucket_name
        .clone()
        .unwrap_or_else(|| format!("msk-connect-sink-{}", target.account));

    let bucket = unit.declare(
        "sink-bucket",
        Declaration::Bucket(BucketSpec::disposable(bucket_name.clone())),
    );
    let fabric = unit.declare(
        "msk-vpc",
        Declaration::Fabric(FabricSource::Lookup {
            name: FABRIC_NAME.to_string(),
        }),
    );
    let identity = unit.declare(
        "connector-role",
        Declaration::Identity(connector_identity("msk-connect-role", options.policy)),
    );
    let access_policy = unit.declare(
        "sink-access-policy",
        Declaration::Policy(PolicyAttachment {
            name: "sink-bucket-read-write".to_string(),
            identity: identity.clone(),
            grants: Vec::new(),
            storage: vec![StorageGrant {
                bucket: bucket.clone(),
                prefix: String::new(),
                access: StorageAccess::ReadWrite,
            }],
        }),
    );
    let plugin = unit.declare(
        "connector-plugin",
        Declaration::Artifact(ArtifactRegistration {
            physical_id: PhysicalId::new(PLUGIN_PHYSICAL_ID),
            source: SourceLocation::new(PLUGIN_BUCKET, options.plugin_key.clone()),
            metadata: ArtifactMetadata {
                logical_name: "kafka-connect-connector-plugin".to_string(),
                description: "connector plugin".to_string(),
                content_type: ContentType::Zip,
            },
        }),
    );

    let sink = S3SinkConfig::new(options.topics.clone(), target.region.clone(), bucket_name);
    let connector = unit.declare(
        "s3-sink-connector",
        Declaration::Connector(ConnectorSpec {
            name: "s3SinkConnector".to_string(),
            kafka_connect_version: "2.7.1".to_string(),
            bootstrap: BootstrapSource::Parameter(parameter_key(BOOTSTRAP_PARAMETER)?),
            artifact: plugin.clone(),
            identity,
            fabric,
            security_groups: vec![SecurityGroupSource::Parameter(parameter_key(
                CLUSTER_SECURITY_GROUP_PARAMETER,
            )?)],
            authentication: AuthenticationMode::None,
            encryption: EncryptionInTransit::Plaintext,
            capacity: options.capacity,
            configuration: sink.to_configuration(),
            worker_log_group: None,
        }),
    );
    // The connector writes into the bucket through the policy; neither is
    // one of its references.
    unit.depends_on(&connector, &bucket);
    unit.depends_on(&connector, &access_policy);

    unit.output("connector-arn", &connector, OutputAttribute::Arn);
    unit.output("custom-plugin-arn", &plugin, OutputAttribute::Arn);

    Ok(unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ResourceId, ResourceKind};
    use pretty_assertions::assert_eq;

    fn target() -> TargetContext {
        TargetContext::new("us-east-1", "123456789012")
    }

    fn position(order: &[ResourceId], id: &str) -> usize {
        order
            .iter()
            .position(|r| r.as_str() == id)
            .unwrap_or_else(|| panic!("{} missing from order", id))
    }

    #[test]
    fn test_cluster_unit_orders_fabric_cluster_then_parameters() {
        let unit = streaming_cluster_unit(&target(), &ClusterUnitOptions::default()).unwrap();
        unit.validate().unwrap();

        let order = unit.creation_order().unwrap();
        assert_eq!(order.len(), 7);
        assert!(position(&order, "msk-vpc") < position(&order, "msk-cluster"));
        assert!(position(&order, "msk-cluster") < position(&order, "msk-brokers-parameter"));
        assert!(position(&order, "instance-sg") < position(&order, "private-instance"));
        assert!(position(&order, "instance-role") < position(&order, "private-instance"));
    }

    #[test]
    fn test_cluster_unit_declares_two_tls_brokers() {
        let unit = streaming_cluster_unit(&target(), &ClusterUnitOptions::default()).unwrap();
        let cluster = unit.resource(&ResourceId::new("msk-cluster")).unwrap();

        match &cluster.declaration {
            Declaration::Cluster(spec) => {
                assert_eq!(spec.broker_count, 2);
                assert_eq!(spec.kafka_version, KafkaVersion::v2_8_1());
                assert_eq!(spec.encryption.listener_port(), 9094);
            }
            other => panic!("unexpected declaration {:?}", other),
        }
        assert!(unit.outputs().contains_key(BOOTSTRAP_OUTPUT));
    }

    #[test]
    fn test_cluster_unit_without_session_host() {
        let options = ClusterUnitOptions {
            session_host: false,
            ..ClusterUnitOptions::default()
        };
        let unit = streaming_cluster_unit(&target(), &options).unwrap();

        assert!(unit
            .resources()
            .iter()
            .all(|r| r.kind() != ResourceKind::Instance));
    }

    #[test]
    fn test_malformed_address_space_is_rejected() {
        let options = ClusterUnitOptions {
            address_space: "10.0.0.0".to_string(),
            ..ClusterUnitOptions::default()
        };
        assert!(matches!(
            streaming_cluster_unit(&target(), &options),
            Err(ConfigError::InvalidCidr(_))
        ));
    }

    #[test]
    fn test_connector_unit_waits_for_bucket_policy_and_plugin() {
        let unit = sink_connector_unit(&target(), &ConnectorUnitOptions::default()).unwrap();
        unit.validate().unwrap();

        let order = unit.creation_order().unwrap();
        let connector = position(&order, "s3-sink-connector");
        assert_eq!(connector, order.len() - 1);
        assert!(position(&order, "sink-access-policy") < connector);
        assert!(position(&order, "connector-plugin") < connector);
        assert!(position(&order, "sink-bucket") < position(&order, "sink-access-policy"));
    }

    #[test]
    fn test_connector_identity_reads_and_writes_sink_bucket() {
        let unit = sink_connector_unit(&target(), &ConnectorUnitOptions::default()).unwrap();
        let policy = unit.resource(&ResourceId::new("sink-access-policy")).unwrap();

        let Declaration::Policy(policy) = &policy.declaration else {
            panic!("policy declaration expected");
        };
        assert_eq!(policy.storage.len(), 1);
        assert_eq!(policy.storage[0].bucket, ResourceId::new("sink-bucket"));
        assert_eq!(policy.storage[0].access, StorageAccess::ReadWrite);
    }

    #[test]
    fn test_connector_unit_binds_fabric_by_name() {
        let unit = sink_connector_unit(&target(), &ConnectorUnitOptions::default()).unwrap();
        let fabric = unit.resource(&ResourceId::new("msk-vpc")).unwrap();

        assert!(!fabric.declaration.is_owned());
        assert_eq!(
            fabric.declaration,
            Declaration::Fabric(FabricSource::Lookup {
                name: FABRIC_NAME.to_string()
            })
        );
    }

    #[test]
    fn test_connector_unit_configures_sink_bucket() {
        let unit = sink_connector_unit(&target(), &ConnectorUnitOptions::default()).unwrap();
        let connector = unit.resource(&ResourceId::new("s3-sink-connector")).unwrap();

        let Declaration::Connector(spec) = &connector.declaration else {
            panic!("connector declaration expected");
        };
        assert_eq!(
            spec.configuration.get("s3.bucket.name").map(String::as_str),
            Some("msk-connect-sink-123456789012")
        );
        assert_eq!(
            spec.configuration.get("topics").map(String::as_str),
            Some("nicks_topic")
        );
        assert_eq!(spec.capacity, CapacityPolicy::default());
    }
}
