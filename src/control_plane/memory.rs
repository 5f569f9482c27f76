// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-memory control plane
//!
//! Behaves like the provider for the calls this crate makes: ids are
//! assigned deterministically, clusters take a configurable number of
//! `describe_cluster` polls to become active, and artifacts gain a revision
//! per registration. Every call is recorded, and faults can be scripted per
//! operation with [`InMemoryControlPlane::fail_next`].

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use tokio::sync::Mutex;
use tracing::debug;

use super::{
    ClusterRequest, ClusterState, ControlPlane, ControlPlaneError, ConnectorRequest,
    InstanceRequest, PolicyRequest,
};
use crate::domain::{
    ArtifactHandle, ArtifactRecord, ArtifactRegistration, AuthenticationMode, BootstrapAddress,
    BucketSpec, EncryptionInTransit, ExecutionIdentity, FabricHandle, NetworkFabric,
    SecurityGroupSpec, SubnetHandle,
};

/// One recorded control-plane call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPlaneCall {
    pub operation: &'static str,
    pub target: String,
}

#[derive(Debug)]
struct BucketEntry {
    spec: BucketSpec,
    objects: BTreeSet<String>,
}

#[derive(Debug)]
struct ClusterEntry {
    request: ClusterRequest,
    polls_remaining: u32,
    security_group_id: String,
}

#[derive(Debug, Default)]
struct State {
    sequence: u64,
    calls: Vec<ControlPlaneCall>,
    faults: HashMap<&'static str, VecDeque<ControlPlaneError>>,
    ready_after_polls: u32,
    denied_sources: HashSet<String>,
    fabrics: BTreeMap<String, FabricHandle>,
    security_groups: BTreeMap<String, (String, SecurityGroupSpec)>,
    identities: BTreeMap<String, ExecutionIdentity>,
    policies: BTreeMap<String, PolicyRequest>,
    buckets: BTreeMap<String, BucketEntry>,
    clusters: BTreeMap<String, ClusterEntry>,
    artifacts: BTreeMap<String, ArtifactRecord>,
    connectors: BTreeMap<String, ConnectorRequest>,
    instances: BTreeMap<String, InstanceRequest>,
}

impl State {
    /// Record the call, then surface a scripted fault if one is queued
    fn record(&mut self, operation: &'static str, target: &str) -> Result<(), ControlPlaneError> {
        self.calls.push(ControlPlaneCall {
            operation,
            target: target.to_string(),
        });
        debug!(operation, target, "Control plane call");
        match self.faults.get_mut(operation).and_then(VecDeque::pop_front) {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.sequence += 1;
        format!("{}-{:04}", prefix, self.sequence)
    }
}

/// Control plane kept entirely in process memory
#[derive(Debug)]
pub struct InMemoryControlPlane {
    region: String,
    account: String,
    state: Mutex<State>,
}

impl InMemoryControlPlane {
    pub fn new(region: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            account: account.into(),
            state: Mutex::new(State::default()),
        }
    }

    /// Clusters report `Creating` for this many polls before turning active
    pub fn with_cluster_ready_after(mut self, polls: u32) -> Self {
        self.state.get_mut().ready_after_polls = polls;
        self
    }

    /// Fail the next call to `operation` with `error`; queued faults are
    /// consumed in order
    pub async fn fail_next(&self, operation: &'static str, error: ControlPlaneError) {
        self.state
            .lock()
            .await
            .faults
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Registrations reading from `bucket` fail with `AccessDenied`
    pub async fn deny_read(&self, bucket: impl Into<String>) {
        self.state.lock().await.denied_sources.insert(bucket.into());
    }

    /// Store an object in a bucket (simulates the sink writing data)
    pub async fn put_object(&self, bucket: &str, key: &str) -> Result<(), ControlPlaneError> {
        let mut state = self.state.lock().await;
        let entry = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| ControlPlaneError::NotFound(format!("bucket {}", bucket)))?;
        entry.objects.insert(key.to_string());
        Ok(())
    }

    pub async fn calls(&self) -> Vec<ControlPlaneCall> {
        self.state.lock().await.calls.clone()
    }

    /// Number of recorded calls to `operation`
    pub async fn call_count(&self, operation: &str) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    pub async fn artifact(&self, physical_id: &str) -> Option<ArtifactRecord> {
        self.state.lock().await.artifacts.get(physical_id).cloned()
    }

    pub async fn connector_named(&self, name: &str) -> Option<ConnectorRequest> {
        self.state
            .lock()
            .await
            .connectors
            .values()
            .find(|c| c.name == name)
            .cloned()
    }

    pub async fn bucket_exists(&self, name: &str) -> bool {
        self.state.lock().await.buckets.contains_key(name)
    }

    pub async fn cluster_count(&self) -> usize {
        self.state.lock().await.clusters.len()
    }

    pub async fn identity(&self, name: &str) -> Option<ExecutionIdentity> {
        self.state.lock().await.identities.get(name).cloned()
    }

    /// Policies attached to the named identity
    pub async fn policies_of(&self, identity_name: &str) -> Vec<PolicyRequest> {
        self.state
            .lock()
            .await
            .policies
            .values()
            .filter(|p| p.identity_name == identity_name)
            .cloned()
            .collect()
    }

    pub async fn instance_count(&self) -> usize {
        self.state.lock().await.instances.len()
    }

    fn arn(&self, service: &str, resource: &str) -> String {
        format!(
            "arn:aws:{}:{}:{}:{}",
            service, self.region, self.account, resource
        )
    }

    fn check_connector(state: &State, request: &ConnectorRequest) -> Result<(), ControlPlaneError> {
        if request.authentication == AuthenticationMode::Iam
            && request.encryption == EncryptionInTransit::Plaintext
        {
            return Err(ControlPlaneError::Rejected(
                "IAM client authentication requires TLS encryption in transit".to_string(),
            ));
        }
        let known = state.artifacts.values().any(|record| {
            record.handle.arn == request.artifact.arn
                && request.artifact.revision <= record.handle.revision
        });
        if !known {
            return Err(ControlPlaneError::Rejected(format!(
                "custom plugin {} does not exist",
                request.artifact
            )));
        }
        if request.security_group_ids.is_empty() || request.subnet_ids.is_empty() {
            return Err(ControlPlaneError::Rejected(
                "connector needs at least one subnet and one security group".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ControlPlane for InMemoryControlPlane {
    async fn create_fabric(&self, fabric: &NetworkFabric) -> Result<FabricHandle, ControlPlaneError> {
        let mut state = self.state.lock().await;
        state.record("create_fabric", &fabric.name)?;
        if state.fabrics.values().any(|f| f.name == fabric.name) {
            return Err(ControlPlaneError::Conflict(format!(
                "fabric {} already exists",
                fabric.name
            )));
        }

        let fabric_id = state.next_id("vpc");
        let subnets = fabric
            .subnets
            .iter()
            .map(|subnet| SubnetHandle {
                subnet_id: state.next_id("subnet"),
                kind: subnet.kind,
                availability_zone: subnet.availability_zone.clone(),
                cidr: subnet.cidr,
            })
            .collect();
        let handle = FabricHandle {
            fabric_id: fabric_id.clone(),
            name: fabric.name.clone(),
            address_space: fabric.address_space,
            subnets,
        };
        state.fabrics.insert(fabric_id, handle.clone());
        Ok(handle)
    }

    async fn lookup_fabric(&self, name: &str) -> Result<FabricHandle, ControlPlaneError> {
        let mut state = self.state.lock().await;
        state.record("lookup_fabric", name)?;
        state
            .fabrics
            .values()
            .find(|f| f.name == name)
            .cloned()
            .ok_or_else(|| ControlPlaneError::NotFound(format!("fabric {}", name)))
    }

    async fn delete_fabric(&self, fabric_id: &str) -> Result<(), ControlPlaneError> {
        let mut state = self.state.lock().await;
        state.record("delete_fabric", fabric_id)?;
        if state
            .security_groups
            .values()
            .any(|(owner, _)| owner == fabric_id)
        {
            return Err(ControlPlaneError::Conflict(format!(
                "fabric {} still has security groups",
                fabric_id
            )));
        }
        state
            .fabrics
            .remove(fabric_id)
            .map(|_| ())
            .ok_or_else(|| ControlPlaneError::NotFound(format!("fabric {}", fabric_id)))
    }

    async fn create_security_group(
        &self,
        fabric_id: &str,
        spec: &SecurityGroupSpec,
    ) -> Result<String, ControlPlaneError> {
        let mut state = self.state.lock().await;
        state.record("create_security_group", &spec.name)?;
        if !state.fabrics.contains_key(fabric_id) {
            return Err(ControlPlaneError::NotFound(format!("fabric {}", fabric_id)));
        }
        let group_id = state.next_id("sg");
        state
            .security_groups
            .insert(group_id.clone(), (fabric_id.to_string(), spec.clone()));
        Ok(group_id)
    }

    async fn delete_security_group(&self, group_id: &str) -> Result<(), ControlPlaneError> {
        let mut state = self.state.lock().await;
        state.record("delete_security_group", group_id)?;
        state
            .security_groups
            .remove(group_id)
            .map(|_| ())
            .ok_or_else(|| ControlPlaneError::NotFound(format!("security group {}", group_id)))
    }

    async fn put_identity(&self, identity: &ExecutionIdentity) -> Result<String, ControlPlaneError> {
        let mut state = self.state.lock().await;
        state.record("put_identity", identity.name())?;
        state
            .identities
            .insert(identity.name().to_string(), identity.clone());
        Ok(format!("arn:aws:iam::{}:role/{}", self.account, identity.name()))
    }

    async fn delete_identity(&self, name: &str) -> Result<(), ControlPlaneError> {
        let mut state = self.state.lock().await;
        state.record("delete_identity", name)?;
        if state.policies.values().any(|p| p.identity_name == name) {
            return Err(ControlPlaneError::Conflict(format!(
                "identity {} still has attached policies",
                name
            )));
        }
        state
            .identities
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ControlPlaneError::NotFound(format!("identity {}", name)))
    }

    async fn put_policy(&self, request: &PolicyRequest) -> Result<String, ControlPlaneError> {
        let mut state = self.state.lock().await;
        state.record("put_policy", &request.name)?;
        if !state.identities.contains_key(&request.identity_name) {
            return Err(ControlPlaneError::NotFound(format!(
                "identity {}",
                request.identity_name
            )));
        }
        let policy_id = format!("{}/{}", request.identity_name, request.name);
        state.policies.insert(policy_id.clone(), request.clone());
        Ok(policy_id)
    }

    async fn delete_policy(&self, policy_id: &str) -> Result<(), ControlPlaneError> {
        let mut state = self.state.lock().await;
        state.record("delete_policy", policy_id)?;
        state
            .policies
            .remove(policy_id)
            .map(|_| ())
            .ok_or_else(|| ControlPlaneError::NotFound(format!("policy {}", policy_id)))
    }

    async fn create_bucket(&self, spec: &BucketSpec) -> Result<String, ControlPlaneError> {
        let mut state = self.state.lock().await;
        state.record("create_bucket", &spec.name)?;
        if state.buckets.contains_key(&spec.name) {
            return Err(ControlPlaneError::Conflict(format!(
                "bucket {} already exists",
                spec.name
            )));
        }
        state.buckets.insert(
            spec.name.clone(),
            BucketEntry {
                spec: spec.clone(),
                objects: BTreeSet::new(),
            },
        );
        Ok(format!("arn:aws:s3:::{}", spec.name))
    }

    async fn delete_bucket(&self, name: &str, empty_first: bool) -> Result<(), ControlPlaneError> {
        let mut state = self.state.lock().await;
        state.record("delete_bucket", name)?;
        let entry = state
            .buckets
            .get(name)
            .ok_or_else(|| ControlPlaneError::NotFound(format!("bucket {}", name)))?;
        if !entry.objects.is_empty() && !empty_first {
            return Err(ControlPlaneError::Rejected(format!(
                "bucket {} is not empty ({} objects, versioned: {})",
                name,
                entry.objects.len(),
                entry.spec.versioned
            )));
        }
        state.buckets.remove(name);
        Ok(())
    }

    async fn create_cluster(&self, request: &ClusterRequest) -> Result<String, ControlPlaneError> {
        let mut state = self.state.lock().await;
        state.record("create_cluster", &request.name)?;
        if !request.instance_class.as_str().starts_with("kafka.") {
            return Err(ControlPlaneError::Rejected(format!(
                "unsupported broker instance type {}",
                request.instance_class
            )));
        }
        let zones = request.subnet_ids.len() as u32;
        if zones == 0 || request.broker_count % zones != 0 {
            return Err(ControlPlaneError::Rejected(format!(
                "broker count {} must be a multiple of the {} client subnets",
                request.broker_count, zones
            )));
        }

        let sequence = state.next_id("cluster");
        let arn = self.arn("kafka", &format!("cluster/{}/{}", request.name, sequence));
        let security_group_id = state.next_id("sg");
        let polls_remaining = state.ready_after_polls;
        state.clusters.insert(
            arn.clone(),
            ClusterEntry {
                request: request.clone(),
                polls_remaining,
                security_group_id,
            },
        );
        Ok(arn)
    }

    async fn describe_cluster(&self, cluster_arn: &str) -> Result<ClusterState, ControlPlaneError> {
        let mut state = self.state.lock().await;
        state.record("describe_cluster", cluster_arn)?;
        let region = self.region.clone();
        let entry = state
            .clusters
            .get_mut(cluster_arn)
            .ok_or_else(|| ControlPlaneError::NotFound(format!("cluster {}", cluster_arn)))?;
        if entry.polls_remaining > 0 {
            entry.polls_remaining -= 1;
            return Ok(ClusterState::Creating);
        }

        let port = entry.request.encryption.listener_port();
        let brokers: Vec<String> = (1..=entry.request.broker_count)
            .map(|i| {
                format!(
                    "b-{}.{}.kafka.{}.amazonaws.com:{}",
                    i, entry.request.name, region, port
                )
            })
            .collect();
        Ok(ClusterState::Active {
            bootstrap: BootstrapAddress::new(brokers.join(",")),
            security_group_id: entry.security_group_id.clone(),
        })
    }

    async fn delete_cluster(&self, cluster_arn: &str) -> Result<(), ControlPlaneError> {
        let mut state = self.state.lock().await;
        state.record("delete_cluster", cluster_arn)?;
        state
            .clusters
            .remove(cluster_arn)
            .map(|_| ())
            .ok_or_else(|| ControlPlaneError::NotFound(format!("cluster {}", cluster_arn)))
    }

    async fn describe_artifact(
        &self,
        physical_id: &str,
    ) -> Result<Option<ArtifactRecord>, ControlPlaneError> {
        let mut state = self.state.lock().await;
        state.record("describe_artifact", physical_id)?;
        Ok(state.artifacts.get(physical_id).cloned())
    }

    async fn register_artifact(
        &self,
        registration: &ArtifactRegistration,
    ) -> Result<ArtifactHandle, ControlPlaneError> {
        let mut state = self.state.lock().await;
        let physical_id = registration.physical_id.as_str();
        state.record("register_artifact", physical_id)?;

        if state.denied_sources.contains(&registration.source.bucket) {
            return Err(ControlPlaneError::AccessDenied(format!(
                "s3:GetObject on {}",
                registration.source
            )));
        }

        let existing = state.artifacts.get(physical_id).cloned();
        let handle = match existing {
            Some(existing)
                if existing.metadata.logical_name != registration.metadata.logical_name =>
            {
                return Err(ControlPlaneError::Conflict(format!(
                    "{} is already registered as {}",
                    physical_id, existing.metadata.logical_name
                )));
            }
            Some(existing) => ArtifactHandle {
                arn: existing.handle.arn.clone(),
                revision: existing.handle.revision + 1,
            },
            None => {
                let suffix = state.next_id("plugin");
                ArtifactHandle {
                    arn: self.arn(
                        "kafkaconnect",
                        &format!(
                            "custom-plugin/{}/{}",
                            registration.metadata.logical_name, suffix
                        ),
                    ),
                    revision: 1,
                }
            }
        };

        state.artifacts.insert(
            physical_id.to_string(),
            ArtifactRecord {
                physical_id: registration.physical_id.clone(),
                handle: handle.clone(),
                source: registration.source.clone(),
                metadata: registration.metadata.clone(),
            },
        );
        Ok(handle)
    }

    async fn deregister_artifact(&self, artifact_arn: &str) -> Result<(), ControlPlaneError> {
        let mut state = self.state.lock().await;
        state.record("deregister_artifact", artifact_arn)?;
        let physical_id = state
            .artifacts
            .iter()
            .find(|(_, record)| record.handle.arn == artifact_arn)
            .map(|(id, _)| id.clone())
            .ok_or_else(|| ControlPlaneError::NotFound(format!("custom plugin {}", artifact_arn)))?;
        state.artifacts.remove(&physical_id);
        Ok(())
    }

    async fn create_connector(&self, request: &ConnectorRequest) -> Result<String, ControlPlaneError> {
        let mut state = self.state.lock().await;
        state.record("create_connector", &request.name)?;
        if state.connectors.values().any(|c| c.name == request.name) {
            return Err(ControlPlaneError::Conflict(format!(
                "connector {} already exists",
                request.name
            )));
        }
        Self::check_connector(&state, request)?;
        let suffix = state.next_id("connector");
        let arn = self.arn("kafkaconnect", &format!("connector/{}/{}", request.name, suffix));
        state.connectors.insert(arn.clone(), request.clone());
        Ok(arn)
    }

    async fn update_connector(
        &self,
        connector_arn: &str,
        request: &ConnectorRequest,
    ) -> Result<(), ControlPlaneError> {
        let mut state = self.state.lock().await;
        state.record("update_connector", connector_arn)?;
        if !state.connectors.contains_key(connector_arn) {
            return Err(ControlPlaneError::NotFound(format!("connector {}", connector_arn)));
        }
        Self::check_connector(&state, request)?;
        state
            .connectors
            .insert(connector_arn.to_string(), request.clone());
        Ok(())
    }

    async fn delete_connector(&self, connector_arn: &str) -> Result<(), ControlPlaneError> {
        let mut state = self.state.lock().await;
        state.record("delete_connector", connector_arn)?;
        state
            .connectors
            .remove(connector_arn)
            .map(|_| ())
            .ok_or_else(|| ControlPlaneError::NotFound(format!("connector {}", connector_arn)))
    }

    async fn launch_instance(&self, request: &InstanceRequest) -> Result<String, ControlPlaneError> {
        let mut state = self.state.lock().await;
        state.record("launch_instance", &request.name)?;
        if !state.security_groups.contains_key(&request.security_group_id) {
            return Err(ControlPlaneError::NotFound(format!(
                "security group {}",
                request.security_group_id
            )));
        }
        let instance_id = state.next_id("i");
        state.instances.insert(instance_id.clone(), request.clone());
        Ok(instance_id)
    }

    async fn terminate_instance(&self, instance_id: &str) -> Result<(), ControlPlaneError> {
        let mut state = self.state.lock().await;
        state.record("terminate_instance", instance_id)?;
        state
            .instances
            .remove(instance_id)
            .map(|_| ())
            .ok_or_else(|| ControlPlaneError::NotFound(format!("instance {}", instance_id)))
    }
}
