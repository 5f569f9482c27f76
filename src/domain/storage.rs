// Copyright (c) 2025 - Cowboy AI, Inc.
//! Object-storage bucket and session-access instance declarations

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{InstanceClass, RemovalPolicy, ResourceId, SubnetKind};
use crate::errors::ConfigError;

/// Sink bucket declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSpec {
    pub name: String,
    pub versioned: bool,
    /// Empty the bucket before deleting it
    pub auto_delete_objects: bool,
    pub removal_policy: RemovalPolicy,
}

impl BucketSpec {
    /// Unversioned bucket that is emptied and deleted with its unit
    pub fn disposable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            versioned: false,
            auto_delete_objects: true,
            removal_policy: RemovalPolicy::Destroy,
        }
    }

    /// Bucket naming rules: 3-63 chars of lowercase letters, digits, `-` and `.`
    pub fn validate(&self) -> Result<(), ConfigError> {
        let len = self.name.len();
        if !(3..=63).contains(&len) {
            return Err(ConfigError::invalid(
                "bucket.name",
                format!("{:?} must be 3-63 characters", self.name),
            ));
        }
        let valid = self
            .name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
        if !valid {
            return Err(ConfigError::invalid(
                "bucket.name",
                format!("{:?} contains invalid characters", self.name),
            ));
        }
        Ok(())
    }
}

/// Launch script handed verbatim to the instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserData(String);

impl UserData {
    pub fn new(script: impl Into<String>) -> Self {
        Self(script.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<user-data {} bytes>", self.0.len())
    }
}

/// Instance used to reach private resources through session manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInstanceSpec {
    pub name: String,
    pub instance_class: InstanceClass,
    pub machine_image: String,
    pub fabric: ResourceId,
    pub subnet_kind: SubnetKind,
    pub security_group: ResourceId,
    pub identity: ResourceId,
    pub user_data: UserData,
}

impl SessionInstanceSpec {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid("instance.name", "must not be empty"));
        }
        if self.machine_image.trim().is_empty() {
            return Err(ConfigError::invalid("instance.machine_image", "must not be empty"));
        }
        Ok(())
    }
}
