// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deployment units
//!
//! A unit is a set of declarations deployed and destroyed together against
//! one target. Ordering inside a unit comes from the declarations' own
//! references plus explicit `depends_on` edges; nothing is inferred across
//! units, which talk only through the value exchange.

use std::collections::{BTreeMap, HashSet};

use super::graph::{EdgeKind, ResourceGraph};
use super::outputs::{OutputAttribute, UnitOutput};
use crate::config::TargetContext;
use crate::domain::{Declaration, Resource, ResourceId};
use crate::errors::{ProvisioningError, ProvisioningResult};

#[derive(Debug, Clone)]
pub struct DeploymentUnit {
    pub name: String,
    pub target: TargetContext,
    resources: Vec<Resource>,
    /// `(dependent, prerequisite)`
    explicit: Vec<(ResourceId, ResourceId)>,
    outputs: BTreeMap<String, UnitOutput>,
}

impl DeploymentUnit {
    pub fn new(name: impl Into<String>, target: TargetContext) -> Self {
        Self {
            name: name.into(),
            target,
            resources: Vec::new(),
            explicit: Vec::new(),
            outputs: BTreeMap::new(),
        }
    }

    /// Add a declaration; returns its id for use in later declarations
    pub fn declare(&mut self, id: impl Into<ResourceId>, declaration: Declaration) -> ResourceId {
        let resource = Resource::new(id, declaration);
        let id = resource.id.clone();
        self.resources.push(resource);
        id
    }

    /// `dependent` waits for `prerequisite` even without a reference
    pub fn depends_on(&mut self, dependent: &ResourceId, prerequisite: &ResourceId) {
        self.explicit.push((dependent.clone(), prerequisite.clone()));
    }

    /// Expose an attribute of `resource` as a named unit output
    pub fn output(
        &mut self,
        name: impl Into<String>,
        resource: &ResourceId,
        attribute: OutputAttribute,
    ) {
        self.outputs.insert(
            name.into(),
            UnitOutput {
                resource: resource.clone(),
                attribute,
            },
        );
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn resource(&self, id: &ResourceId) -> Option<&Resource> {
        self.resources.iter().find(|r| &r.id == id)
    }

    pub fn explicit_edges(&self) -> &[(ResourceId, ResourceId)] {
        &self.explicit
    }

    pub fn outputs(&self) -> &BTreeMap<String, UnitOutput> {
        &self.outputs
    }

    /// Check every declaration and reference without touching the control
    /// plane
    pub fn validate(&self) -> ProvisioningResult<()> {
        let mut seen = HashSet::new();
        for resource in &self.resources {
            if !seen.insert(&resource.id) {
                return Err(ProvisioningError::configuration(
                    &resource.id,
                    "declared more than once",
                ));
            }
        }

        for resource in &self.resources {
            resource
                .declaration
                .validate()
                .map_err(|e| ProvisioningError::configuration(&resource.id, e))?;
            if let Some(missing) = resource
                .declaration
                .references()
                .into_iter()
                .find(|r| !seen.contains(r))
            {
                return Err(ProvisioningError::configuration(
                    &resource.id,
                    format!("references {} which is not declared in unit {}", missing, self.name),
                ));
            }
        }

        for (dependent, prerequisite) in &self.explicit {
            for id in [dependent, prerequisite] {
                if !seen.contains(id) {
                    return Err(ProvisioningError::configuration(
                        id,
                        format!("used in depends_on but not declared in unit {}", self.name),
                    ));
                }
            }
        }

        for (name, output) in &self.outputs {
            if !seen.contains(&output.resource) {
                return Err(ProvisioningError::configuration(
                    &output.resource,
                    format!("output {} names an undeclared resource", name),
                ));
            }
        }
        Ok(())
    }

    /// Dependency graph over reference and explicit edges
    pub fn graph(&self) -> ProvisioningResult<ResourceGraph> {
        let mut graph = ResourceGraph::new();
        for resource in &self.resources {
            graph.add_resource(resource.id.clone());
        }
        for resource in &self.resources {
            for prerequisite in resource.declaration.references() {
                graph.add_edge(&prerequisite, &resource.id, EdgeKind::Reference)?;
            }
        }
        for (dependent, prerequisite) in &self.explicit {
            graph.add_edge(prerequisite, dependent, EdgeKind::Explicit)?;
        }
        Ok(graph)
    }

    pub fn creation_order(&self) -> ProvisioningResult<Vec<ResourceId>> {
        self.graph()?.creation_order()
    }

    pub fn deletion_order(&self) -> ProvisioningResult<Vec<ResourceId>> {
        self.graph()?.deletion_order()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BucketSpec, ExecutionIdentity, PolicyAttachment, ServicePrincipal, StorageAccess, StorageGrant};
    use pretty_assertions::assert_eq;

    fn unit() -> DeploymentUnit {
        DeploymentUnit::new("sink", TargetContext::new("us-east-1", "123456789012"))
    }

    #[test]
    fn test_policy_waits_for_identity_and_bucket() {
        let mut unit = unit();
        let policy = unit.declare(
            "write-policy",
            Declaration::Policy(PolicyAttachment {
                name: "sink-write".to_string(),
                identity: ResourceId::new("role"),
                grants: Vec::new(),
                storage: vec![StorageGrant {
                    bucket: ResourceId::new("bucket"),
                    prefix: String::new(),
                    access: StorageAccess::Write,
                }],
            }),
        );
        unit.declare(
            "role",
            Declaration::Identity(ExecutionIdentity::trusted_by(
                "connector-role",
                ServicePrincipal::ConnectorService,
            )),
        );
        unit.declare("bucket", Declaration::Bucket(BucketSpec::disposable("sink-bucket")));

        unit.validate().unwrap();
        let order = unit.creation_order().unwrap();
        assert_eq!(order.last(), Some(&policy));
    }

    #[test]
    fn test_undeclared_reference_is_rejected() {
        let mut unit = unit();
        unit.declare(
            "write-policy",
            Declaration::Policy(PolicyAttachment {
                name: "sink-write".to_string(),
                identity: ResourceId::new("role"),
                grants: Vec::new(),
                storage: vec![StorageGrant {
                    bucket: ResourceId::new("bucket"),
                    prefix: String::new(),
                    access: StorageAccess::Write,
                }],
            }),
        );

        let err = unit.validate().unwrap_err();
        assert_eq!(err.resource(), Some(&ResourceId::new("write-policy")));
    }

    #[test]
    fn test_duplicate_declaration_is_rejected() {
        let mut unit = unit();
        unit.declare("bucket", Declaration::Bucket(BucketSpec::disposable("one-bucket")));
        unit.declare("bucket", Declaration::Bucket(BucketSpec::disposable("two-bucket")));
        assert!(matches!(
            unit.validate(),
            Err(ProvisioningError::Configuration { .. })
        ));
    }

    #[test]
    fn test_explicit_edge_orders_unrelated_resources() {
        let mut unit = unit();
        let first = unit.declare("a", Declaration::Bucket(BucketSpec::disposable("bucket-a")));
        let second = unit.declare("b", Declaration::Bucket(BucketSpec::disposable("bucket-b")));
        unit.depends_on(&first, &second);

        assert_eq!(unit.creation_order().unwrap(), vec![second, first]);
    }
}
