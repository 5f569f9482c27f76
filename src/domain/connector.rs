// Copyright (c) 2025 - Cowboy AI, Inc.
//! Sink Connector Declaration and Capacity Policy
//!
//! # Capacity invariants
//!
//! - `min_workers >= 1` and `min_workers <= max_workers`
//! - compute units per worker come from a fixed enumeration
//! - scale thresholds are CPU percentages in `[0, 100]`
//!
//! Scale-in and scale-out thresholds are set independently. A scale-in
//! threshold above the scale-out threshold is accepted (the control plane
//! decides what it means) but reported by [`CapacityPolicy::warnings`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::ResourceId;
use crate::errors::ConfigError;
use crate::exchange::ParameterKey;

/// Where the connector gets the cluster's bootstrap address from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum BootstrapSource {
    /// A cluster declared in the same unit
    Direct(ResourceId),
    /// A value published by another unit
    Parameter(ParameterKey),
}

/// Where a connector security group id comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum SecurityGroupSource {
    /// A security group declared in the same unit
    Declared(ResourceId),
    /// The security group of a cluster declared in the same unit
    ClusterOf(ResourceId),
    /// A group id published by another unit
    Parameter(ParameterKey),
    /// A fixed id managed outside this crate
    Literal(String),
}

/// How the connector authenticates to the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthenticationMode {
    #[default]
    None,
    Iam,
}

/// Connector-to-cluster encryption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EncryptionInTransit {
    #[default]
    Plaintext,
    Tls,
}

/// Compute units per worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum McuCount {
    One,
    Two,
    Four,
    Eight,
}

impl McuCount {
    pub fn value(&self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Four => 4,
            Self::Eight => 8,
        }
    }
}

impl TryFrom<u8> for McuCount {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            4 => Ok(Self::Four),
            8 => Ok(Self::Eight),
            other => Err(ConfigError::invalid(
                "capacity.mcu_count",
                format!("{} is not one of 1, 2, 4, 8", other),
            )),
        }
    }
}

impl From<McuCount> for u8 {
    fn from(value: McuCount) -> Self {
        value.value()
    }
}

/// Autoscaling configuration of the connector runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapacityPolicy {
    pub min_workers: u32,
    pub max_workers: u32,
    pub mcu_count: McuCount,
    pub scale_in_cpu_percent: u8,
    pub scale_out_cpu_percent: u8,
}

/// Accepted but suspicious capacity settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityWarning {
    /// Scale-in fires at a higher utilization than scale-out
    InvertedScaleThresholds { scale_in: u8, scale_out: u8 },
}

impl fmt::Display for CapacityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacityWarning::InvertedScaleThresholds {
                scale_in,
                scale_out,
            } => write!(
                f,
                "scale-in threshold {}% is above scale-out threshold {}%",
                scale_in, scale_out
            ),
        }
    }
}

impl Default for CapacityPolicy {
    fn default() -> Self {
        Self {
            min_workers: 1,
            max_workers: 1,
            mcu_count: McuCount::Two,
            scale_in_cpu_percent: 50,
            scale_out_cpu_percent: 80,
        }
    }
}

impl CapacityPolicy {
    /// Check hard invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_workers == 0 {
            return Err(ConfigError::invalid(
                "capacity.min_workers",
                "at least one worker is required",
            ));
        }
        if self.min_workers > self.max_workers {
            return Err(ConfigError::invalid(
                "capacity.min_workers",
                format!(
                    "min worker count {} exceeds max worker count {}",
                    self.min_workers, self.max_workers
                ),
            ));
        }
        for (field, value) in [
            ("capacity.scale_in_cpu_percent", self.scale_in_cpu_percent),
            ("capacity.scale_out_cpu_percent", self.scale_out_cpu_percent),
        ] {
            if value > 100 {
                return Err(ConfigError::invalid(
                    field,
                    format!("{} is not a percentage", value),
                ));
            }
        }
        Ok(())
    }

    /// Settings that are accepted but worth a second look
    pub fn warnings(&self) -> Vec<CapacityWarning> {
        let mut warnings = Vec::new();
        if self.scale_in_cpu_percent > self.scale_out_cpu_percent {
            warnings.push(CapacityWarning::InvertedScaleThresholds {
                scale_in: self.scale_in_cpu_percent,
                scale_out: self.scale_out_cpu_percent,
            });
        }
        warnings
    }
}

/// Sink connector declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorSpec {
    pub name: String,
    pub kafka_connect_version: String,
    pub bootstrap: BootstrapSource,
    pub artifact: ResourceId,
    pub identity: ResourceId,
    pub fabric: ResourceId,
    pub security_groups: Vec<SecurityGroupSource>,
    pub authentication: AuthenticationMode,
    pub encryption: EncryptionInTransit,
    pub capacity: CapacityPolicy,
    pub configuration: BTreeMap<String, String>,
    /// Log group for worker logs; `None` disables log delivery
    pub worker_log_group: Option<String>,
}

impl ConnectorSpec {
    /// Check local invariants before any reference is resolved
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid("connector.name", "must not be empty"));
        }
        if self.kafka_connect_version.trim().is_empty() {
            return Err(ConfigError::invalid(
                "connector.kafka_connect_version",
                "must not be empty",
            ));
        }
        if self.security_groups.is_empty() {
            return Err(ConfigError::invalid(
                "connector.security_groups",
                "at least one security group is required",
            ));
        }
        if !self.configuration.contains_key("connector.class") {
            return Err(ConfigError::invalid(
                "connector.configuration",
                "connector.class is required",
            ));
        }
        self.capacity.validate()
    }

    /// Same-unit resources this declaration reads from
    pub fn references(&self) -> Vec<ResourceId> {
        let mut refs = vec![
            self.artifact.clone(),
            self.identity.clone(),
            self.fabric.clone(),
        ];
        if let BootstrapSource::Direct(cluster) = &self.bootstrap {
            refs.push(cluster.clone());
        }
        for group in &self.security_groups {
            match group {
                SecurityGroupSource::Declared(id) | SecurityGroupSource::ClusterOf(id) => {
                    refs.push(id.clone())
                }
                SecurityGroupSource::Parameter(_) | SecurityGroupSource::Literal(_) => {}
            }
        }
        refs
    }
}

/// Configuration of the S3 sink connector plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3SinkConfig {
    pub topics: Vec<String>,
    pub region: String,
    pub bucket: String,
    pub tasks_max: u32,
    pub flush_size: u32,
}

impl S3SinkConfig {
    pub fn new(topics: Vec<String>, region: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            topics,
            region: region.into(),
            bucket: bucket.into(),
            tasks_max: 1,
            flush_size: 1,
        }
    }

    /// Connector configuration map
    pub fn to_configuration(&self) -> BTreeMap<String, String> {
        [
            ("connector.class", "io.confluent.connect.s3.S3SinkConnector".to_string()),
            ("tasks.max", self.tasks_max.to_string()),
            ("topics", self.topics.join(",")),
            ("s3.region", self.region.clone()),
            ("s3.bucket.name", self.bucket.clone()),
            ("flush.size", self.flush_size.to_string()),
            ("storage.class", "io.confluent.connect.s3.storage.S3Storage".to_string()),
            (
                "format.class",
                "io.confluent.connect.s3.format.json.JsonFormat".to_string(),
            ),
            (
                "partitioner.class",
                "io.confluent.connect.storage.partitioner.DefaultPartitioner".to_string(),
            ),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}
