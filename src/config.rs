// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deployment configuration
//!
//! Plain structs with defaults. Only [`TargetContext`] and
//! [`DeploymentConfig`] read the environment; nothing here parses command
//! lines.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::ConfigError;
use crate::nats::NatsConfig;
use crate::retry::RetryPolicy;

/// Region and account a deployment unit targets
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetContext {
    pub region: String,
    pub account: String,
}

impl TargetContext {
    pub fn new(region: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            account: account.into(),
        }
    }

    /// Read `AWS_REGION` and `AWS_ACCOUNT`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingEnvironment(name))
        };
        Ok(Self {
            region: read("AWS_REGION")?,
            account: read("AWS_ACCOUNT")?,
        })
    }

    /// Availability zone names `<region>a`, `<region>b`, ...
    pub fn availability_zones(&self, count: usize) -> Vec<String> {
        (b'a'..=b'z')
            .take(count)
            .map(|suffix| format!("{}{}", self.region, suffix as char))
            .collect()
    }
}

/// How long to wait for a cluster to report ready
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub poll_interval: Duration,
    pub max_polls: u32,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            // 30 minutes
            max_polls: 60,
        }
    }
}

impl ReadinessPolicy {
    /// Poll without sleeping
    pub fn immediate(max_polls: u32) -> Self {
        Self {
            poll_interval: Duration::ZERO,
            max_polls,
        }
    }
}

/// Storage backend of the parameter bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    /// File-based storage (persistent across restarts)
    File,
    /// Memory-based storage (lost on restart)
    Memory,
}

/// JetStream key/value bucket backing the NATS exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterBucketConfig {
    pub bucket: String,
    /// Revisions kept per key
    pub history: i64,
    pub storage: StorageType,
    /// Number of replicas (for clustered NATS)
    pub replicas: usize,
}

impl Default for ParameterBucketConfig {
    fn default() -> Self {
        Self {
            bucket: "MSK_PARAMETERS".to_string(),
            history: 1,
            storage: StorageType::File,
            replicas: 1,
        }
    }
}

impl ParameterBucketConfig {
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    pub fn with_storage(mut self, storage: StorageType) -> Self {
        self.storage = storage;
        self
    }
}

/// Everything a deployer run needs besides the units themselves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentConfig {
    pub target: TargetContext,
    pub retry: RetryPolicy,
    pub readiness: ReadinessPolicy,
    pub nats: NatsConfig,
    pub parameter_bucket: ParameterBucketConfig,
}

impl DeploymentConfig {
    pub fn new(target: TargetContext) -> Self {
        Self {
            target,
            retry: RetryPolicy::default(),
            readiness: ReadinessPolicy::default(),
            nats: NatsConfig::default(),
            parameter_bucket: ParameterBucketConfig::default(),
        }
    }

    /// Target from `AWS_REGION`/`AWS_ACCOUNT`; `NATS_URL` and
    /// `PARAMETER_BUCKET` override their defaults when set
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(TargetContext::from_lookup(&lookup)?);
        if let Some(url) = lookup("NATS_URL") {
            config.nats = config.nats.with_servers(&url);
        }
        if let Some(bucket) = lookup("PARAMETER_BUCKET") {
            config.parameter_bucket = config.parameter_bucket.with_bucket(bucket);
        }
        Ok(config)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_readiness(mut self, readiness: ReadinessPolicy) -> Self {
        self.readiness = readiness;
        self
    }
}
