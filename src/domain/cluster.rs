// Copyright (c) 2025 - Cowboy AI, Inc.
//! Streaming Cluster Declaration

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{RemovalPolicy, ResourceId};
use crate::errors::ConfigError;

/// Minimum broker count for availability
pub const MIN_BROKERS: u32 = 2;

/// Kafka version tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KafkaVersion(String);

impl KafkaVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    pub fn v2_8_1() -> Self {
        Self::new("2.8.1")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KafkaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Broker instance class, validated by the control plane
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceClass(String);

impl InstanceClass {
    pub fn new(class: impl Into<String>) -> Self {
        Self(class.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client-broker encryption in transit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterEncryption {
    /// TLS only
    #[default]
    Tls,
    /// Both TLS and plaintext listeners
    TlsPlaintext,
    /// Plaintext only
    Plaintext,
}

impl ClusterEncryption {
    /// Listener port clients are admitted on
    pub fn listener_port(&self) -> u16 {
        match self {
            Self::Tls | Self::TlsPlaintext => 9094,
            Self::Plaintext => 9092,
        }
    }
}

/// Cluster declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub name: String,
    pub broker_count: u32,
    pub kafka_version: KafkaVersion,
    pub instance_class: InstanceClass,
    /// Fabric the brokers bind to
    pub fabric: ResourceId,
    pub encryption: ClusterEncryption,
    pub removal_policy: RemovalPolicy,
}

impl ClusterSpec {
    /// Check local invariants; instance class is left to the control plane
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid("cluster.name", "must not be empty"));
        }
        if self.broker_count < MIN_BROKERS {
            return Err(ConfigError::invalid(
                "cluster.broker_count",
                format!("{} is below the minimum of {}", self.broker_count, MIN_BROKERS),
            ));
        }
        Ok(())
    }
}

/// Client connection string, known only once the cluster is ready
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BootstrapAddress(String);

impl BootstrapAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Individual `host:port` entries
    pub fn brokers(&self) -> impl Iterator<Item = &str> {
        self.0.split(',').map(str::trim).filter(|b| !b.is_empty())
    }
}

impl fmt::Display for BootstrapAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(brokers: u32) -> ClusterSpec {
        ClusterSpec {
            name: "msk-cluster".to_string(),
            broker_count: brokers,
            kafka_version: KafkaVersion::v2_8_1(),
            instance_class: InstanceClass::new("kafka.t3.small"),
            fabric: ResourceId::new("msk-vpc"),
            encryption: ClusterEncryption::Tls,
            removal_policy: RemovalPolicy::Destroy,
        }
    }

    #[test]
    fn test_broker_minimum() {
        assert!(spec(2).validate().is_ok());
        assert!(spec(1).validate().is_err());
    }

    #[test]
    fn test_listener_port() {
        assert_eq!(ClusterEncryption::Tls.listener_port(), 9094);
        assert_eq!(ClusterEncryption::Plaintext.listener_port(), 9092);
    }

    #[test]
    fn test_bootstrap_brokers() {
        let address = BootstrapAddress::new("b-1.example:9094, b-2.example:9094");
        let brokers: Vec<_> = address.brokers().collect();
        assert_eq!(brokers, vec!["b-1.example:9094", "b-2.example:9094"]);
    }
}
