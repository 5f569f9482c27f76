// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deployment ledger
//!
//! What the deployer knows about a unit between runs: per resource, the
//! fingerprint of the declaration that was applied, its physical id and its
//! output. A record with a physical id but no output is a resource whose
//! creation started but did not finish; the next run resumes it instead of
//! creating a second one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::outputs::ResourceOutput;
use crate::domain::{Declaration, RemovalPolicy, ResourceId, ResourceKind};
use crate::errors::ProvisioningResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub kind: ResourceKind,
    /// Declaration as last applied
    pub fingerprint: serde_json::Value,
    pub physical_id: Option<String>,
    pub output: Option<ResourceOutput>,
    pub removal_policy: RemovalPolicy,
}

impl ResourceRecord {
    /// Record of a fully applied resource
    pub fn applied(declaration: &Declaration, output: ResourceOutput) -> ProvisioningResult<Self> {
        Ok(Self {
            kind: declaration.kind(),
            fingerprint: fingerprint(declaration)?,
            physical_id: Some(output.physical_id()),
            output: Some(output),
            removal_policy: declaration.removal_policy(),
        })
    }

    /// Record of a resource whose creation is still in progress
    pub fn pending(declaration: &Declaration, physical_id: impl Into<String>) -> ProvisioningResult<Self> {
        Ok(Self {
            kind: declaration.kind(),
            fingerprint: fingerprint(declaration)?,
            physical_id: Some(physical_id.into()),
            output: None,
            removal_policy: declaration.removal_policy(),
        })
    }

    /// Whether `declaration` is what was last applied
    pub fn matches(&self, declaration: &Declaration) -> ProvisioningResult<bool> {
        Ok(self.fingerprint == fingerprint(declaration)?)
    }

    /// Declaration as last applied
    pub fn declaration(&self) -> ProvisioningResult<Declaration> {
        Ok(serde_json::from_value(self.fingerprint.clone())?)
    }
}

fn fingerprint(declaration: &Declaration) -> ProvisioningResult<serde_json::Value> {
    Ok(serde_json::to_value(declaration)?)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentState {
    unit: String,
    records: BTreeMap<ResourceId, ResourceRecord>,
}

impl DeploymentState {
    pub fn new(unit: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            records: BTreeMap::new(),
        }
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn record(&self, id: &ResourceId) -> Option<&ResourceRecord> {
        self.records.get(id)
    }

    pub fn records(&self) -> impl Iterator<Item = (&ResourceId, &ResourceRecord)> {
        self.records.iter()
    }

    pub fn upsert(&mut self, id: ResourceId, record: ResourceRecord) {
        self.records.insert(id, record);
    }

    pub fn forget(&mut self, id: &ResourceId) -> Option<ResourceRecord> {
        self.records.remove(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_json(&self) -> ProvisioningResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> ProvisioningResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
