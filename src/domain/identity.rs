// Copyright (c) 2025 - Cowboy AI, Inc.
//! Execution Identities and Capability Grants
//!
//! Each runtime actor (cluster, connector service, session-access host) runs
//! under its own identity. An identity is trusted by exactly one service
//! class and accumulates grants; grants are additive only.
//!
//! The composer functions at the bottom of this module produce the
//! least-privilege grant sets each actor needs.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::ConfigError;

/// Tag the connector service puts on network interfaces it manages
pub const CONNECTOR_MANAGED_TAG: &str = "AmazonMSKConnectManaged";

/// Managed policy that lets an instance register with session manager
pub const SESSION_MANAGER_POLICY: &str = "AmazonSSMManagedInstanceCore";

/// Service class allowed to assume an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServicePrincipal {
    /// The streaming cluster
    Cluster,
    /// The connector runtime
    ConnectorService,
    /// The session-access compute instance
    SessionHost,
}

impl ServicePrincipal {
    /// Provider service name
    pub fn service_name(&self) -> &'static str {
        match self {
            Self::Cluster => "kafka.amazonaws.com",
            Self::ConnectorService => "kafkaconnect.amazonaws.com",
            Self::SessionHost => "ec2.amazonaws.com",
        }
    }
}

impl fmt::Display for ServicePrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.service_name())
    }
}

/// Statement effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// Condition attached to a grant (e.g. `StringEquals` on a resource tag)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrantCondition {
    pub operator: String,
    pub key: String,
    pub value: String,
}

/// Action patterns × resource patterns × optional conditions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilityGrant {
    pub effect: Effect,
    pub actions: Vec<String>,
    pub resources: Vec<String>,
    pub conditions: Vec<GrantCondition>,
}

impl CapabilityGrant {
    /// Allow `actions` on `resources`
    pub fn allow<A, R>(actions: A, resources: R) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            effect: Effect::Allow,
            actions: actions.into_iter().map(Into::into).collect(),
            resources: resources.into_iter().map(Into::into).collect(),
            conditions: Vec::new(),
        }
    }

    /// Restrict the grant with a condition
    pub fn with_condition(
        mut self,
        operator: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.conditions.push(GrantCondition {
            operator: operator.into(),
            key: key.into(),
            value: value.into(),
        });
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.actions.is_empty() {
            return Err(ConfigError::invalid("grant.actions", "must not be empty"));
        }
        if self.resources.is_empty() {
            return Err(ConfigError::invalid("grant.resources", "must not be empty"));
        }
        Ok(())
    }
}

/// Named principal trusted by one service class
///
/// There is no constructor without a trust relationship and no way to
/// remove a grant once added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionIdentity {
    name: String,
    trusted_by: ServicePrincipal,
    managed_policies: Vec<String>,
    grants: Vec<CapabilityGrant>,
}

impl ExecutionIdentity {
    /// Identity assumable by `principal`
    pub fn trusted_by(name: impl Into<String>, principal: ServicePrincipal) -> Self {
        Self {
            name: name.into(),
            trusted_by: principal,
            managed_policies: Vec::new(),
            grants: Vec::new(),
        }
    }

    /// Add a grant (builder form)
    pub fn with_grant(mut self, grant: CapabilityGrant) -> Self {
        self.grant(grant);
        self
    }

    /// Add a grant; duplicates are ignored
    pub fn grant(&mut self, grant: CapabilityGrant) {
        if !self.grants.contains(&grant) {
            self.grants.push(grant);
        }
    }

    /// Attach a provider-managed policy by name
    pub fn attach_managed_policy(mut self, policy: impl Into<String>) -> Self {
        let policy = policy.into();
        if !self.managed_policies.contains(&policy) {
            self.managed_policies.push(policy);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn principal(&self) -> ServicePrincipal {
        self.trusted_by
    }

    pub fn grants(&self) -> &[CapabilityGrant] {
        &self.grants
    }

    pub fn managed_policies(&self) -> &[String] {
        &self.managed_policies
    }

    /// Check identity invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid("identity.name", "must not be empty"));
        }
        self.grants.iter().try_for_each(CapabilityGrant::validate)
    }

    /// Whether any grant allows `action` (exact or trailing-`*` pattern)
    pub fn allows(&self, action: &str) -> bool {
        self.grants
            .iter()
            .filter(|g| g.effect == Effect::Allow)
            .flat_map(|g| g.actions.iter())
            .any(|pattern| match pattern.strip_suffix('*') {
                Some(prefix) => action.starts_with(prefix),
                None => pattern == action,
            })
    }
}

/// Object-storage access level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageAccess {
    Read,
    Write,
    ReadWrite,
}

impl StorageAccess {
    fn actions(&self) -> Vec<&'static str> {
        const READ: [&str; 3] = ["s3:GetObject*", "s3:GetBucket*", "s3:List*"];
        const WRITE: [&str; 7] = [
            "s3:DeleteObject*",
            "s3:PutObject",
            "s3:PutObjectLegalHold",
            "s3:PutObjectRetention",
            "s3:PutObjectTagging",
            "s3:PutObjectVersionTagging",
            "s3:Abort*",
        ];
        match self {
            Self::Read => READ.to_vec(),
            Self::Write => WRITE.to_vec(),
            Self::ReadWrite => READ.iter().chain(WRITE.iter()).copied().collect(),
        }
    }
}

/// Grant on a bucket and the objects under `prefix`
pub fn storage_grant(bucket: &str, prefix: &str, access: StorageAccess) -> CapabilityGrant {
    CapabilityGrant::allow(
        access.actions(),
        [
            format!("arn:aws:s3:::{}", bucket),
            format!("arn:aws:s3:::{}/{}*", bucket, prefix),
        ],
    )
}

/// Actions the connector service needs to run inside a fabric and deliver logs
pub fn connector_service_grant() -> CapabilityGrant {
    CapabilityGrant::allow(
        [
            "kafkaconnect:*",
            "ec2:CreateNetworkInterface",
            "ec2:DescribeSubnets",
            "ec2:DescribeVpcs",
            "ec2:DescribeSecurityGroups",
            "ec2:CreateTags",
        ],
        ["*"],
    )
}

/// Log-delivery actions
pub fn log_delivery_grant() -> CapabilityGrant {
    CapabilityGrant::allow(
        [
            "logs:CreateLogDelivery",
            "logs:GetLogDelivery",
            "logs:DeleteLogDelivery",
            "logs:ListLogDeliveries",
            "logs:PutResourcePolicy",
            "logs:DescribeResourcePolicies",
            "logs:DescribeLogGroups",
        ],
        ["*"],
    )
}

/// Network-interface lifecycle actions, limited to interfaces carrying `tag`
pub fn network_interface_grant(tag: &str) -> CapabilityGrant {
    CapabilityGrant::allow(
        [
            "ec2:DescribeNetworkInterfaces",
            "ec2:CreateNetworkInterfacePermission",
            "ec2:AttachNetworkInterface",
            "ec2:DetachNetworkInterface",
            "ec2:DeleteNetworkInterface",
        ],
        ["arn:aws:ec2:*:*:network-interface/*"],
    )
    .with_condition("StringEquals", format!("ec2:ResourceTag/{}", tag), "true")
}

/// Policy-completeness choices for the connector identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorPolicyOptions {
    /// Grant tag-scoped network-interface lifecycle actions
    pub network_interface_lifecycle: bool,
    /// Grant log-delivery actions
    pub log_delivery: bool,
}

impl Default for ConnectorPolicyOptions {
    fn default() -> Self {
        Self {
            network_interface_lifecycle: true,
            log_delivery: true,
        }
    }
}

/// Identity for the connector runtime (storage grants are attached separately)
pub fn connector_identity(name: impl Into<String>, options: ConnectorPolicyOptions) -> ExecutionIdentity {
    let mut identity = ExecutionIdentity::trusted_by(name, ServicePrincipal::ConnectorService)
        .with_grant(connector_service_grant());
    if options.log_delivery {
        identity.grant(log_delivery_grant());
    }
    if options.network_interface_lifecycle {
        identity.grant(network_interface_grant(CONNECTOR_MANAGED_TAG));
    }
    identity
}

/// Identity for the session-access instance
pub fn session_host_identity(name: impl Into<String>) -> ExecutionIdentity {
    ExecutionIdentity::trusted_by(name, ServicePrincipal::SessionHost)
        .attach_managed_policy(SESSION_MANAGER_POLICY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grants_are_additive_and_deduplicated() {
        let mut identity = ExecutionIdentity::trusted_by("role", ServicePrincipal::Cluster);
        identity.grant(log_delivery_grant());
        identity.grant(log_delivery_grant());
        identity.grant(connector_service_grant());

        assert_eq!(identity.grants().len(), 2);
    }

    #[test]
    fn test_connector_identity_defaults() {
        let identity = connector_identity("msk-connect-role", ConnectorPolicyOptions::default());

        assert_eq!(identity.principal(), ServicePrincipal::ConnectorService);
        assert!(identity.allows("kafkaconnect:CreateConnector"));
        assert!(identity.allows("logs:CreateLogDelivery"));
        assert!(identity.allows("ec2:DeleteNetworkInterface"));
    }

    #[test]
    fn test_connector_identity_without_eni_lifecycle() {
        let options = ConnectorPolicyOptions {
            network_interface_lifecycle: false,
            log_delivery: true,
        };
        let identity = connector_identity("msk-connect-role", options);

        assert!(!identity.allows("ec2:DeleteNetworkInterface"));
        assert!(identity.allows("ec2:CreateNetworkInterface"));
    }

    #[test]
    fn test_network_interface_grant_is_tag_scoped() {
        let grant = network_interface_grant(CONNECTOR_MANAGED_TAG);
        assert_eq!(grant.conditions.len(), 1);
        assert_eq!(
            grant.conditions[0].key,
            "ec2:ResourceTag/AmazonMSKConnectManaged"
        );
    }

    #[test]
    fn test_storage_grant() {
        let grant = storage_grant("sink", "", StorageAccess::Write);
        assert!(grant.actions.contains(&"s3:PutObject".to_string()));
        assert!(!grant.actions.contains(&"s3:GetObject*".to_string()));
        assert_eq!(grant.resources, vec!["arn:aws:s3:::sink", "arn:aws:s3:::sink/*"]);
    }

    #[test]
    fn test_read_write_grant_combines_both_action_sets() {
        let grant = storage_grant("sink", "topics/", StorageAccess::ReadWrite);
        for action in ["s3:GetObject*", "s3:List*", "s3:PutObject", "s3:Abort*"] {
            assert!(grant.actions.contains(&action.to_string()), "{} missing", action);
        }
        assert_eq!(grant.resources[1], "arn:aws:s3:::sink/topics/*");
    }

    #[test]
    fn test_session_host_identity() {
        let identity = session_host_identity("instance-role");
        assert_eq!(identity.principal().service_name(), "ec2.amazonaws.com");
        assert_eq!(identity.managed_policies(), &[SESSION_MANAGER_POLICY.to_string()]);
        assert!(identity.validate().is_ok());
    }

    #[test]
    fn test_empty_grant_rejected() {
        let identity = ExecutionIdentity::trusted_by("role", ServicePrincipal::Cluster)
            .with_grant(CapabilityGrant::allow(Vec::<String>::new(), ["*"]));
        assert!(identity.validate().is_err());
    }
}
