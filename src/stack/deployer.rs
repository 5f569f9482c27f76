// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deployer
//!
//! Applies a [`DeploymentUnit`] in creation order and destroys it in the
//! reverse order. The [`DeploymentState`] ledger carries what was applied
//! between runs:
//!
//! ```text
//! no record                        → create
//! record, same declaration         → unchanged (no control-plane call)
//! record, changed declaration      → update, or a configuration error for
//!                                    kinds that cannot change in place
//! record, upstream output moved    → update (updatable kinds only)
//! record without output (cluster)  → resume waiting for readiness
//! ```
//!
//! Updatable resources are also refreshed when something they reference was
//! created or updated in the same run, which is how a connector picks up a
//! new artifact revision.
//!
//! Nothing is rolled back on failure. The error names the failed resource
//! and what completed before it; re-running with the same ledger finishes
//! the remainder.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::graph::{EdgeKind, ResourceGraph};
use super::outputs::{Outputs, ResourceOutput};
use super::state::{DeploymentState, ResourceRecord};
use super::unit::DeploymentUnit;
use crate::config::DeploymentConfig;
use crate::control_plane::{ControlPlane, InstanceRequest, PolicyRequest};
use crate::domain::{
    storage_grant, Declaration, FabricSource, ParameterDeclaration, ParameterValue,
    PolicyAttachment, RemovalPolicy, Resource, ResourceId, ResourceKind, SessionInstanceSpec,
};
use crate::errors::{ProvisioningError, ProvisioningResult};
use crate::events::{EventJournal, EventPublisher, LifecycleOperation, ProvisioningEvent};
use crate::exchange::ValueExchange;
use crate::provision::{
    publish_parameter, remove_parameter, ArtifactRegistrar, ClusterProvisioner,
    ConnectorProvisioner,
};
use crate::retry::{call_with_retry, retry_transient, RetryFailure, RetryPolicy};

/// What a run did to one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceAction {
    pub resource: ResourceId,
    pub kind: ResourceKind,
    pub operation: LifecycleOperation,
}

/// Outcome of a successful deploy or destroy
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentReport {
    pub unit: String,
    pub correlation_id: Uuid,
    pub actions: Vec<ResourceAction>,
    /// Named unit outputs
    pub outputs: BTreeMap<String, String>,
    pub events: Vec<ProvisioningEvent>,
}

impl DeploymentReport {
    pub fn operation_of(&self, resource: &ResourceId) -> Option<LifecycleOperation> {
        self.actions
            .iter()
            .find(|a| &a.resource == resource)
            .map(|a| a.operation)
    }

    pub fn output(&self, name: &str) -> Option<&str> {
        self.outputs.get(name).map(String::as_str)
    }

    /// Resources in the order they were handled
    pub fn resources(&self) -> Vec<&ResourceId> {
        self.actions.iter().map(|a| &a.resource).collect()
    }

    pub fn count(&self, operation: LifecycleOperation) -> usize {
        self.actions
            .iter()
            .filter(|a| a.operation == operation)
            .count()
    }
}

struct Run {
    journal: EventJournal,
    actions: Vec<ResourceAction>,
    completed: Vec<ResourceId>,
}

impl Run {
    fn new(unit: &str) -> Self {
        Self {
            journal: EventJournal::new(unit),
            actions: Vec::new(),
            completed: Vec::new(),
        }
    }

    fn into_report(self, unit: &str, outputs: BTreeMap<String, String>) -> DeploymentReport {
        DeploymentReport {
            unit: unit.to_string(),
            correlation_id: self.journal.correlation_id(),
            actions: self.actions,
            outputs,
            events: self.journal.into_events(),
        }
    }
}

/// Drives deployment units against a control plane and a value exchange
pub struct Deployer<C: ControlPlane + ?Sized, X: ValueExchange + ?Sized> {
    control_plane: Arc<C>,
    exchange: Arc<X>,
    retry: RetryPolicy,
    registrar: ArtifactRegistrar<C>,
    clusters: ClusterProvisioner<C>,
    connectors: ConnectorProvisioner<C, X>,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl<C, X> Deployer<C, X>
where
    C: ControlPlane + ?Sized,
    X: ValueExchange + ?Sized,
{
    pub fn new(control_plane: Arc<C>, exchange: Arc<X>, config: &DeploymentConfig) -> Self {
        Self {
            registrar: ArtifactRegistrar::new(Arc::clone(&control_plane), config.retry),
            clusters: ClusterProvisioner::new(
                Arc::clone(&control_plane),
                config.retry,
                config.readiness,
            ),
            connectors: ConnectorProvisioner::new(
                Arc::clone(&control_plane),
                Arc::clone(&exchange),
                config.retry,
            ),
            control_plane,
            exchange,
            retry: config.retry,
            publisher: None,
        }
    }

    /// Also send every lifecycle event to `publisher`
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn registrar(&self) -> &ArtifactRegistrar<C> {
        &self.registrar
    }

    /// Apply every declaration of `unit`, prerequisites first
    pub async fn deploy(
        &self,
        unit: &DeploymentUnit,
        state: &mut DeploymentState,
    ) -> ProvisioningResult<DeploymentReport> {
        check_ledger(unit, state)?;
        unit.validate()?;
        let order = unit.creation_order()?;
        info!(unit = %unit.name, resources = order.len(), region = %unit.target.region, "Deploying unit");

        let mut run = Run::new(&unit.name);
        let mut outputs = Outputs::new();
        let mut changed: HashSet<ResourceId> = HashSet::new();

        for id in &order {
            let Some(resource) = unit.resource(id) else {
                continue;
            };
            match self.apply(resource, state, &mut outputs, &changed).await {
                Ok(operation) => {
                    if matches!(
                        operation,
                        LifecycleOperation::Created | LifecycleOperation::Updated
                    ) {
                        changed.insert(id.clone());
                    }
                    let detail = outputs.get(id).map(ResourceOutput::physical_id);
                    self.note(&mut run, resource, operation, detail).await;
                }
                Err(err) => return Err(self.fail(&mut run, unit, resource, err).await),
            }
        }

        let named = unit_outputs(unit, &outputs)?;
        info!(
            unit = %unit.name,
            created = run.actions.iter().filter(|a| a.operation == LifecycleOperation::Created).count(),
            "Unit deployed"
        );
        Ok(run.into_report(&unit.name, named))
    }

    /// Delete what `state` recorded for `unit`, dependents first
    ///
    /// The ledger decides what is deleted, so records of resources the unit
    /// no longer declares are deleted too. Resources that are looked up or
    /// were applied with [`RemovalPolicy::Retain`] stay in place; the ledger
    /// forgets them either way. Deleting something that is already gone
    /// succeeds.
    pub async fn destroy(
        &self,
        unit: &DeploymentUnit,
        state: &mut DeploymentState,
    ) -> ProvisioningResult<DeploymentReport> {
        check_ledger(unit, state)?;
        let (order, declarations) = recorded_deletion_order(unit, state)?;
        info!(unit = %unit.name, recorded = state.len(), "Destroying unit");

        let mut run = Run::new(&unit.name);
        for id in &order {
            let (Some(record), Some(declaration)) =
                (state.record(id).cloned(), declarations.get(id))
            else {
                continue;
            };
            let resource = Resource::new(id.clone(), declaration.clone());
            if unit.resource(id).is_none() {
                info!(resource = %id, kind = %record.kind, "No longer declared, destroying from ledger");
            }

            let operation =
                if !declaration.is_owned() || record.removal_policy == RemovalPolicy::Retain {
                    info!(resource = %id, kind = %record.kind, "Leaving resource in place");
                    LifecycleOperation::Retained
                } else {
                    match self.delete(id, &record).await {
                        Ok(()) => LifecycleOperation::Deleted,
                        Err(err) => return Err(self.fail(&mut run, unit, &resource, err).await),
                    }
                };
            state.forget(id);
            self.note(&mut run, &resource, operation, record.physical_id.clone())
                .await;
        }

        info!(unit = %unit.name, "Unit destroyed");
        Ok(run.into_report(&unit.name, BTreeMap::new()))
    }

    async fn apply(
        &self,
        resource: &Resource,
        state: &mut DeploymentState,
        outputs: &mut Outputs,
        changed: &HashSet<ResourceId>,
    ) -> ProvisioningResult<LifecycleOperation> {
        let id = &resource.id;
        let declaration = &resource.declaration;

        if !declaration.is_owned() {
            let output = self.create(id, declaration, state, outputs).await?;
            finish(state, outputs, resource, output)?;
            return Ok(LifecycleOperation::Resolved);
        }

        if let Some(record) = state.record(id).cloned() {
            let same = record.matches(declaration)?;
            match record.output.clone() {
                Some(previous) => {
                    let upstream_changed = declaration.kind().supports_update()
                        && (declaration.references().iter().any(|r| changed.contains(r))
                            || stale_binding(declaration, &previous, outputs));
                    if same && !upstream_changed {
                        debug!(resource = %id, "Declaration unchanged");
                        outputs.insert(id.clone(), previous);
                        return Ok(LifecycleOperation::Unchanged);
                    }
                    if !declaration.kind().supports_update() {
                        return Err(cannot_change(id, declaration));
                    }
                    let output = self.update(id, declaration, &record, previous, outputs).await?;
                    finish(state, outputs, resource, output)?;
                    return Ok(LifecycleOperation::Updated);
                }
                None => {
                    if let (Declaration::Cluster(_), Some(arn)) =
                        (declaration, record.physical_id.as_deref())
                    {
                        if !same {
                            return Err(cannot_change(id, declaration));
                        }
                        info!(resource = %id, arn, "Resuming wait for cluster readiness");
                        let output =
                            ResourceOutput::Cluster(self.clusters.await_ready(id, arn).await?);
                        finish(state, outputs, resource, output)?;
                        return Ok(LifecycleOperation::Created);
                    }
                }
            }
        }

        let output = self.create(id, declaration, state, outputs).await?;
        finish(state, outputs, resource, output)?;
        Ok(LifecycleOperation::Created)
    }

    async fn create(
        &self,
        id: &ResourceId,
        declaration: &Declaration,
        state: &mut DeploymentState,
        outputs: &Outputs,
    ) -> ProvisioningResult<ResourceOutput> {
        let cp = self.control_plane.as_ref();
        let retry = &self.retry;

        let output = match declaration {
            Declaration::Fabric(FabricSource::Owned(fabric)) => {
                let handle =
                    call_with_retry(retry, id, "create_fabric", move || cp.create_fabric(fabric))
                        .await?;
                ResourceOutput::Fabric(handle)
            }
            Declaration::Fabric(FabricSource::Lookup { name }) => {
                let name = name.as_str();
                match retry_transient(retry, "lookup_fabric", move || cp.lookup_fabric(name)).await {
                    Ok(handle) => ResourceOutput::Fabric(handle),
                    Err(failure) if failure.error.is_not_found() => {
                        return Err(ProvisioningError::unresolved(id, format!("fabric {}", name)))
                    }
                    Err(failure) => return Err(failure.into_provisioning(id, "lookup_fabric")),
                }
            }
            Declaration::SecurityGroup(group) => {
                let fabric_id = outputs.fabric(id, &group.fabric)?.fabric_id.as_str();
                let spec = &group.spec;
                let group_id = call_with_retry(retry, id, "create_security_group", move || {
                    cp.create_security_group(fabric_id, spec)
                })
                .await?;
                ResourceOutput::SecurityGroup { group_id }
            }
            Declaration::Identity(identity) => {
                let arn =
                    call_with_retry(retry, id, "put_identity", move || cp.put_identity(identity))
                        .await?;
                ResourceOutput::Identity {
                    name: identity.name().to_string(),
                    arn,
                }
            }
            Declaration::Policy(policy) => self.put_policy(id, policy, outputs).await?,
            Declaration::Bucket(spec) => {
                let arn =
                    call_with_retry(retry, id, "create_bucket", move || cp.create_bucket(spec))
                        .await?;
                ResourceOutput::Bucket {
                    name: spec.name.clone(),
                    arn,
                }
            }
            Declaration::Cluster(spec) => {
                let fabric = outputs.fabric(id, &spec.fabric)?;
                let request = ClusterProvisioner::<C>::build_request(spec, fabric);
                let arn = self.clusters.create(id, &request).await?;
                state.upsert(id.clone(), ResourceRecord::pending(declaration, arn.as_str())?);
                ResourceOutput::Cluster(self.clusters.await_ready(id, &arn).await?)
            }
            Declaration::Parameter(parameter) => self.publish(id, parameter, outputs).await?,
            Declaration::Artifact(registration) => {
                ResourceOutput::Artifact(self.registrar.on_create(id, registration).await?)
            }
            Declaration::Connector(spec) => {
                let request = self.connectors.resolve(id, spec, outputs).await?;
                let arn = self.connectors.create(id, &request).await?;
                ResourceOutput::Connector {
                    arn,
                    artifact: request.artifact,
                }
            }
            Declaration::Instance(spec) => self.launch(id, spec, outputs).await?,
        };
        Ok(output)
    }

    async fn update(
        &self,
        id: &ResourceId,
        declaration: &Declaration,
        record: &ResourceRecord,
        previous: ResourceOutput,
        outputs: &Outputs,
    ) -> ProvisioningResult<ResourceOutput> {
        let cp = self.control_plane.as_ref();
        match (declaration, previous) {
            (Declaration::Identity(identity), _) => {
                let arn = call_with_retry(&self.retry, id, "put_identity", move || {
                    cp.put_identity(identity)
                })
                .await?;
                Ok(ResourceOutput::Identity {
                    name: identity.name().to_string(),
                    arn,
                })
            }
            (Declaration::Policy(policy), _) => self.put_policy(id, policy, outputs).await,
            (Declaration::Parameter(parameter), _) => self.publish(id, parameter, outputs).await,
            (Declaration::Artifact(next), ResourceOutput::Artifact(previous_handle)) => {
                let Declaration::Artifact(applied) = record.declaration()? else {
                    return Err(ProvisioningError::configuration(
                        id,
                        "ledger entry is not an artifact registration",
                    ));
                };
                let handle = self
                    .registrar
                    .on_update(id, &applied, &previous_handle, next)
                    .await?;
                Ok(ResourceOutput::Artifact(handle))
            }
            (Declaration::Connector(spec), ResourceOutput::Connector { arn, .. }) => {
                let request = self.connectors.resolve(id, spec, outputs).await?;
                self.connectors.update(id, &arn, &request).await?;
                Ok(ResourceOutput::Connector {
                    arn,
                    artifact: request.artifact,
                })
            }
            (declaration, _) => Err(cannot_change(id, declaration)),
        }
    }

    async fn delete(&self, id: &ResourceId, record: &ResourceRecord) -> ProvisioningResult<()> {
        let Some(physical_id) = record.physical_id.as_deref() else {
            return Ok(());
        };
        let cp = self.control_plane.as_ref();
        let retry = &self.retry;

        match record.declaration()? {
            Declaration::Fabric(_) => tolerate_missing(
                id,
                "delete_fabric",
                retry_transient(retry, "delete_fabric", move || cp.delete_fabric(physical_id)).await,
            ),
            Declaration::SecurityGroup(_) => tolerate_missing(
                id,
                "delete_security_group",
                retry_transient(retry, "delete_security_group", move || {
                    cp.delete_security_group(physical_id)
                })
                .await,
            ),
            Declaration::Identity(_) => tolerate_missing(
                id,
                "delete_identity",
                retry_transient(retry, "delete_identity", move || cp.delete_identity(physical_id))
                    .await,
            ),
            Declaration::Policy(_) => tolerate_missing(
                id,
                "delete_policy",
                retry_transient(retry, "delete_policy", move || cp.delete_policy(physical_id))
                    .await,
            ),
            Declaration::Bucket(spec) => {
                let empty_first = spec.auto_delete_objects;
                tolerate_missing(
                    id,
                    "delete_bucket",
                    retry_transient(retry, "delete_bucket", move || {
                        cp.delete_bucket(physical_id, empty_first)
                    })
                    .await,
                )
            }
            Declaration::Cluster(_) => self.clusters.delete(id, physical_id).await,
            Declaration::Parameter(parameter) => {
                remove_parameter(self.exchange.as_ref(), id, &parameter.key).await
            }
            Declaration::Artifact(_) => match &record.output {
                Some(ResourceOutput::Artifact(handle)) => self.registrar.on_delete(id, handle).await,
                _ => Ok(()),
            },
            Declaration::Connector(_) => self.connectors.delete(id, physical_id).await,
            Declaration::Instance(_) => tolerate_missing(
                id,
                "terminate_instance",
                retry_transient(retry, "terminate_instance", move || {
                    cp.terminate_instance(physical_id)
                })
                .await,
            ),
        }
    }

    async fn put_policy(
        &self,
        id: &ResourceId,
        policy: &PolicyAttachment,
        outputs: &Outputs,
    ) -> ProvisioningResult<ResourceOutput> {
        let (identity_name, _) = outputs.identity(id, &policy.identity)?;
        let mut grants = policy.grants.clone();
        for storage in &policy.storage {
            let bucket = outputs.bucket_name(id, &storage.bucket)?;
            grants.push(storage_grant(bucket, &storage.prefix, storage.access));
        }
        let request = PolicyRequest {
            name: policy.name.clone(),
            identity_name: identity_name.to_string(),
            grants,
        };

        let cp = self.control_plane.as_ref();
        let request = &request;
        let policy_id =
            call_with_retry(&self.retry, id, "put_policy", move || cp.put_policy(request)).await?;
        Ok(ResourceOutput::Policy { policy_id })
    }

    async fn publish(
        &self,
        id: &ResourceId,
        parameter: &ParameterDeclaration,
        outputs: &Outputs,
    ) -> ProvisioningResult<ResourceOutput> {
        let value = match &parameter.value {
            ParameterValue::ClusterBootstrap(cluster) => {
                outputs.cluster(id, cluster)?.bootstrap.to_string()
            }
            ParameterValue::ClusterSecurityGroup(cluster) => {
                outputs.cluster(id, cluster)?.security_group_id.clone()
            }
            ParameterValue::Literal(value) => value.clone(),
        };
        publish_parameter(self.exchange.as_ref(), id, &parameter.key, &value).await?;
        Ok(ResourceOutput::Parameter {
            key: parameter.key.clone(),
            value,
        })
    }

    async fn launch(
        &self,
        id: &ResourceId,
        spec: &SessionInstanceSpec,
        outputs: &Outputs,
    ) -> ProvisioningResult<ResourceOutput> {
        let subnet_id = outputs
            .fabric(id, &spec.fabric)?
            .subnet_ids(spec.subnet_kind)
            .into_iter()
            .next()
            .ok_or_else(|| {
                ProvisioningError::configuration(
                    id,
                    format!("fabric {} has no {:?} subnet", spec.fabric, spec.subnet_kind),
                )
            })?;
        let (_, role_arn) = outputs.identity(id, &spec.identity)?;
        let request = InstanceRequest {
            name: spec.name.clone(),
            instance_class: spec.instance_class.clone(),
            machine_image: spec.machine_image.clone(),
            subnet_id,
            security_group_id: outputs.security_group(id, &spec.security_group)?.to_string(),
            role_arn: role_arn.to_string(),
            user_data: spec.user_data.clone(),
        };

        let cp = self.control_plane.as_ref();
        let request = &request;
        let instance_id = call_with_retry(&self.retry, id, "launch_instance", move || {
            cp.launch_instance(request)
        })
        .await?;
        Ok(ResourceOutput::Instance { instance_id })
    }

    async fn note(
        &self,
        run: &mut Run,
        resource: &Resource,
        operation: LifecycleOperation,
        detail: Option<String>,
    ) {
        let event = run
            .journal
            .record(&resource.id, resource.kind(), operation, detail)
            .clone();
        self.emit(&event).await;
        run.actions.push(ResourceAction {
            resource: resource.id.clone(),
            kind: resource.kind(),
            operation,
        });
        run.completed.push(resource.id.clone());
    }

    async fn fail(
        &self,
        run: &mut Run,
        unit: &DeploymentUnit,
        resource: &Resource,
        err: ProvisioningError,
    ) -> ProvisioningError {
        error!(
            unit = %unit.name,
            resource = %resource.id,
            kind = %resource.kind(),
            completed = run.completed.len(),
            error = %err,
            "Resource failed"
        );
        let event = run
            .journal
            .record(
                &resource.id,
                resource.kind(),
                LifecycleOperation::Failed,
                Some(err.to_string()),
            )
            .clone();
        self.emit(&event).await;

        if run.completed.is_empty() {
            err
        } else {
            ProvisioningError::PartialDeployment {
                unit: unit.name.clone(),
                failed: resource.id.clone(),
                completed: run.completed.clone(),
                source: Box::new(err),
            }
        }
    }

    async fn emit(&self, event: &ProvisioningEvent) {
        if let Some(publisher) = &self.publisher {
            if let Err(err) = publisher.publish(event).await {
                warn!(
                    subject = %event.subject(),
                    error = %err,
                    "Failed to publish provisioning event"
                );
            }
        }
    }
}

fn finish(
    state: &mut DeploymentState,
    outputs: &mut Outputs,
    resource: &Resource,
    output: ResourceOutput,
) -> ProvisioningResult<()> {
    state.upsert(
        resource.id.clone(),
        ResourceRecord::applied(&resource.declaration, output.clone())?,
    );
    outputs.insert(resource.id.clone(), output);
    Ok(())
}

/// Whether an applied output embeds an upstream output that has since moved
///
/// Catches a dependent whose own update failed in an earlier run after its
/// prerequisite was already updated.
fn stale_binding(declaration: &Declaration, previous: &ResourceOutput, outputs: &Outputs) -> bool {
    match (declaration, previous) {
        (Declaration::Connector(spec), ResourceOutput::Connector { artifact, .. }) => matches!(
            outputs.get(&spec.artifact),
            Some(ResourceOutput::Artifact(live)) if live != artifact
        ),
        (Declaration::Parameter(parameter), ResourceOutput::Parameter { value, .. }) => {
            let live = match &parameter.value {
                ParameterValue::ClusterBootstrap(cluster) => match outputs.get(cluster) {
                    Some(ResourceOutput::Cluster(output)) => output.bootstrap.to_string(),
                    _ => return false,
                },
                ParameterValue::ClusterSecurityGroup(cluster) => match outputs.get(cluster) {
                    Some(ResourceOutput::Cluster(output)) => output.security_group_id.clone(),
                    _ => return false,
                },
                ParameterValue::Literal(_) => return false,
            };
            &live != value
        }
        _ => false,
    }
}

/// Deletion order over every ledger record, with the declarations they were
/// applied with
///
/// Records the unit still declares keep the unit's declaration order and
/// explicit edges; the rest follow in ledger order and are placed by their
/// references alone.
fn recorded_deletion_order(
    unit: &DeploymentUnit,
    state: &DeploymentState,
) -> ProvisioningResult<(Vec<ResourceId>, BTreeMap<ResourceId, Declaration>)> {
    let mut declarations = BTreeMap::new();
    let mut graph = ResourceGraph::new();

    let declared = unit.resources().iter().map(|r| &r.id);
    let orphaned = state
        .records()
        .map(|(id, _)| id)
        .filter(|id| unit.resource(id).is_none());
    for id in declared.chain(orphaned) {
        if let Some(record) = state.record(id) {
            declarations.insert(id.clone(), record.declaration()?);
            graph.add_resource(id.clone());
        }
    }

    for (id, declaration) in &declarations {
        for prerequisite in declaration.references() {
            if declarations.contains_key(&prerequisite) {
                graph.add_edge(&prerequisite, id, EdgeKind::Reference)?;
            }
        }
    }
    for (dependent, prerequisite) in unit.explicit_edges() {
        if declarations.contains_key(dependent) && declarations.contains_key(prerequisite) {
            graph.add_edge(prerequisite, dependent, EdgeKind::Explicit)?;
        }
    }

    Ok((graph.deletion_order()?, declarations))
}

fn cannot_change(id: &ResourceId, declaration: &Declaration) -> ProvisioningError {
    ProvisioningError::configuration(
        id,
        format!(
            "a {} cannot be changed in place; declare a replacement under a new id",
            declaration.kind()
        ),
    )
}

fn tolerate_missing(
    id: &ResourceId,
    operation: &str,
    result: Result<(), RetryFailure>,
) -> ProvisioningResult<()> {
    match result {
        Ok(()) => Ok(()),
        Err(failure) if failure.error.is_not_found() => {
            debug!(resource = %id, operation, "Already gone");
            Ok(())
        }
        Err(failure) => Err(failure.into_provisioning(id, operation)),
    }
}

fn check_ledger(unit: &DeploymentUnit, state: &DeploymentState) -> ProvisioningResult<()> {
    if state.unit() != unit.name {
        return Err(ProvisioningError::configuration(
            &ResourceId::new(unit.name.as_str()),
            format!("ledger belongs to unit {:?}", state.unit()),
        ));
    }
    Ok(())
}

fn unit_outputs(
    unit: &DeploymentUnit,
    outputs: &Outputs,
) -> ProvisioningResult<BTreeMap<String, String>> {
    unit.outputs()
        .iter()
        .map(|(name, wanted)| {
            let output = outputs.require(&wanted.resource, &wanted.resource)?;
            let value = output.attribute(wanted.attribute).ok_or_else(|| {
                ProvisioningError::configuration(
                    &wanted.resource,
                    format!("output {} asks for {:?}, which a {} does not have", name, wanted.attribute, output.kind()),
                )
            })?;
            Ok((name.clone(), value))
        })
        .collect()
}
