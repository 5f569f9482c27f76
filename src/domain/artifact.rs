// Copyright (c) 2025 - Cowboy AI, Inc.
//! Custom Plugin Artifact Registration
//!
//! The control plane does not model plugin artifacts declaratively: they are
//! registered by an imperative call and must be deregistered explicitly.
//! A caller-assigned [`PhysicalId`] keeps one logical artifact stable across
//! update calls; each re-registration produces a new revision.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::ConfigError;

/// Caller-assigned identifier, stable across updates
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhysicalId(String);

impl PhysicalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhysicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bucket + key of the uploaded artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub bucket: String,
    pub key: String,
}

impl SourceLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn bucket_arn(&self) -> String {
        format!("arn:aws:s3:::{}", self.bucket)
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Packaging format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContentType {
    Zip,
    Jar,
}

/// Descriptive fields sent with each registration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub logical_name: String,
    pub description: String,
    pub content_type: ContentType,
}

/// Artifact declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRegistration {
    pub physical_id: PhysicalId,
    pub source: SourceLocation,
    pub metadata: ArtifactMetadata,
}

impl ArtifactRegistration {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.physical_id.as_str().trim().is_empty() {
            return Err(ConfigError::invalid("artifact.physical_id", "must not be empty"));
        }
        if self.source.bucket.is_empty() || self.source.key.is_empty() {
            return Err(ConfigError::invalid(
                "artifact.source",
                "bucket and key are both required",
            ));
        }
        if self.metadata.logical_name.trim().is_empty() {
            return Err(ConfigError::invalid("artifact.logical_name", "must not be empty"));
        }
        Ok(())
    }
}

/// Opaque reference to one registered revision
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactHandle {
    pub arn: String,
    pub revision: u64,
}

impl fmt::Display for ArtifactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.arn, self.revision)
    }
}

/// What the control plane currently holds under a physical id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub physical_id: PhysicalId,
    pub handle: ArtifactHandle,
    pub source: SourceLocation,
    pub metadata: ArtifactMetadata,
}

impl ArtifactRecord {
    /// Whether the record was registered from exactly these inputs
    pub fn matches(&self, source: &SourceLocation, metadata: &ArtifactMetadata) -> bool {
        &self.source == source && &self.metadata == metadata
    }
}
