// Copyright (c) 2025 - Cowboy AI, Inc.
//! Custom Artifact Registrar
//!
//! The control plane only offers imperative register/deregister calls for
//! custom artifacts. The registrar turns them into a resource with a
//! create/update/delete contract keyed by the caller-chosen physical id:
//!
//! - `register` is idempotent: unchanged inputs return the live handle
//!   without a control-plane call
//! - changed inputs register a new revision under the same physical id
//! - `deregister` of something already gone succeeds
//!
//! Each physical id is tracked by an [`ArtifactState`] machine; only
//! `Registered` handles are ever returned to callers.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::control_plane::ControlPlane;
use crate::domain::{
    ArtifactHandle, ArtifactMetadata, ArtifactRegistration, PhysicalId, ResourceId,
    SourceLocation,
};
use crate::errors::{ProvisioningError, ProvisioningResult};
use crate::retry::{call_with_retry, retry_transient, RetryPolicy};
use crate::state_machine::{
    ArtifactInput, ArtifactState, StateMachineWithHistory, Transition,
};

/// History of one physical id's lifecycle
pub type ArtifactHistory = Vec<Transition<ArtifactState, ArtifactInput>>;

#[derive(Debug)]
struct Tracked {
    lifecycle: StateMachineWithHistory<ArtifactState>,
    /// Inputs of the live revision
    inputs: Option<(SourceLocation, ArtifactMetadata)>,
}

impl Tracked {
    fn new() -> Self {
        Self {
            lifecycle: StateMachineWithHistory::new(ArtifactState::Absent),
            inputs: None,
        }
    }

    fn step(
        &mut self,
        resource: &ResourceId,
        input: ArtifactInput,
    ) -> ProvisioningResult<Option<ArtifactHandle>> {
        self.lifecycle
            .transition_with_history(input, Utc::now())
            .map_err(|source| ProvisioningError::InvalidTransition {
                resource: resource.clone(),
                source,
            })
    }

    /// Close out a step an earlier call started but never finished
    fn settle(&mut self, resource: &ResourceId) -> ProvisioningResult<()> {
        let input = match self.lifecycle.current_state() {
            ArtifactState::Registering { .. } => ArtifactInput::RegistrationFailed,
            ArtifactState::Deregistering(_) => ArtifactInput::DeregistrationFailed,
            ArtifactState::Absent | ArtifactState::Registered(_) => return Ok(()),
        };
        warn!(resource = %resource, state = %self.lifecycle.current_state(), "Settling unfinished artifact step");
        self.step(resource, input).map(|_| ())
    }

    /// Track `handle` as a fresh registration
    ///
    /// Used when the control plane answered a registration with an arn that
    /// does not supersede the tracked one: the tracked revision no longer
    /// exists there.
    fn retrack(&mut self, resource: &ResourceId, handle: ArtifactHandle) -> ProvisioningResult<()> {
        self.settle(resource)?;
        if self.lifecycle.current_state().visible_handle().is_some() {
            self.step(resource, ArtifactInput::BeginDeregistration)?;
            self.step(resource, ArtifactInput::DeregistrationSucceeded)?;
        }
        self.step(resource, ArtifactInput::BeginRegistration)?;
        self.step(resource, ArtifactInput::RegistrationSucceeded(handle))?;
        Ok(())
    }

    fn live_handle_for(&self, registration: &ArtifactRegistration) -> Option<&ArtifactHandle> {
        let handle = self.lifecycle.current_state().visible_handle()?;
        match &self.inputs {
            Some((source, metadata))
                if source == &registration.source && metadata == &registration.metadata =>
            {
                Some(handle)
            }
            _ => None,
        }
    }

    fn is_live(&self, arn: &str) -> bool {
        self.lifecycle
            .current_state()
            .visible_handle()
            .map(|h| h.arn == arn)
            .unwrap_or(false)
    }
}

/// Registers custom artifacts on behalf of their owning declarations
pub struct ArtifactRegistrar<C: ControlPlane + ?Sized> {
    control_plane: Arc<C>,
    retry: RetryPolicy,
    tracked: Mutex<HashMap<PhysicalId, Tracked>>,
}

impl<C: ControlPlane + ?Sized> ArtifactRegistrar<C> {
    pub fn new(control_plane: Arc<C>, retry: RetryPolicy) -> Self {
        Self {
            control_plane,
            retry,
            tracked: Mutex::new(HashMap::new()),
        }
    }

    /// Register `registration`, or return the live handle if its inputs are
    /// unchanged
    ///
    /// Missing read access on the source and a physical id already taken by
    /// another artifact are terminal. Throttling is retried per the policy.
    pub async fn register(
        &self,
        resource: &ResourceId,
        registration: &ArtifactRegistration,
    ) -> ProvisioningResult<ArtifactHandle> {
        registration
            .validate()
            .map_err(|e| ProvisioningError::configuration(resource, e))?;

        let mut tracked = self.tracked.lock().await;
        let entry = tracked
            .entry(registration.physical_id.clone())
            .or_insert_with(Tracked::new);
        entry.settle(resource)?;

        if let Some(handle) = entry.live_handle_for(registration) {
            debug!(
                resource = %resource,
                physical_id = %registration.physical_id,
                handle = %handle,
                "Artifact inputs unchanged"
            );
            return Ok(handle.clone());
        }

        let cp = self.control_plane.as_ref();
        let physical_id = registration.physical_id.as_str();

        if *entry.lifecycle.current_state() == ArtifactState::Absent {
            let existing = call_with_retry(&self.retry, resource, "describe_artifact", move || {
                cp.describe_artifact(physical_id)
            })
            .await?;

            if let Some(record) = existing {
                if record.matches(&registration.source, &registration.metadata) {
                    entry.step(resource, ArtifactInput::BeginRegistration)?;
                    entry.step(
                        resource,
                        ArtifactInput::RegistrationSucceeded(record.handle.clone()),
                    )?;
                    entry.inputs = Some((record.source, record.metadata));
                    info!(
                        resource = %resource,
                        physical_id,
                        handle = %record.handle,
                        "Adopted existing artifact registration"
                    );
                    return Ok(record.handle);
                }
            }
        }

        entry.step(resource, ArtifactInput::BeginRegistration)?;
        let registered = call_with_retry(&self.retry, resource, "register_artifact", move || {
            cp.register_artifact(registration)
        })
        .await;

        match registered {
            Ok(handle) => {
                if let Err(err) =
                    entry.step(resource, ArtifactInput::RegistrationSucceeded(handle.clone()))
                {
                    warn!(
                        resource = %resource,
                        physical_id,
                        handle = %handle,
                        error = %err,
                        "Tracked revision is gone from the control plane, tracking the new one"
                    );
                    entry.retrack(resource, handle.clone())?;
                }
                entry.inputs = Some((registration.source.clone(), registration.metadata.clone()));
                info!(
                    resource = %resource,
                    physical_id,
                    handle = %handle,
                    "Registered artifact"
                );
                Ok(handle)
            }
            Err(err) => {
                entry.step(resource, ArtifactInput::RegistrationFailed)?;
                error!(resource = %resource, physical_id, error = %err, "Artifact registration failed");
                Err(err)
            }
        }
    }

    /// Deregister `handle`; a handle the control plane no longer knows is
    /// treated as deregistered
    pub async fn deregister(
        &self,
        resource: &ResourceId,
        handle: &ArtifactHandle,
    ) -> ProvisioningResult<()> {
        let mut tracked = self.tracked.lock().await;
        let mut entry = tracked.values_mut().find(|t| t.is_live(&handle.arn));
        if let Some(entry) = entry.as_deref_mut() {
            entry.step(resource, ArtifactInput::BeginDeregistration)?;
        }

        let cp = self.control_plane.as_ref();
        let arn = handle.arn.as_str();
        let outcome = match retry_transient(&self.retry, "deregister_artifact", move || {
            cp.deregister_artifact(arn)
        })
        .await
        {
            Ok(()) => Ok(()),
            Err(failure) if failure.error.is_not_found() => {
                info!(resource = %resource, handle = %handle, "Artifact already deregistered");
                Ok(())
            }
            Err(failure) => Err(failure.into_provisioning(resource, "deregister_artifact")),
        };

        if let Some(entry) = entry {
            match &outcome {
                Ok(()) => {
                    entry.step(resource, ArtifactInput::DeregistrationSucceeded)?;
                    entry.inputs = None;
                }
                Err(_) => {
                    entry.step(resource, ArtifactInput::DeregistrationFailed)?;
                }
            }
        }
        if outcome.is_ok() {
            info!(resource = %resource, handle = %handle, "Deregistered artifact");
        }
        outcome
    }

    /// Owning declaration created
    pub async fn on_create(
        &self,
        resource: &ResourceId,
        registration: &ArtifactRegistration,
    ) -> ProvisioningResult<ArtifactHandle> {
        self.register(resource, registration).await
    }

    /// Owning declaration changed
    ///
    /// A new revision is registered; the previous one is only deregistered
    /// when the physical id itself changed.
    pub async fn on_update(
        &self,
        resource: &ResourceId,
        previous: &ArtifactRegistration,
        previous_handle: &ArtifactHandle,
        next: &ArtifactRegistration,
    ) -> ProvisioningResult<ArtifactHandle> {
        let handle = self.register(resource, next).await?;
        if previous.physical_id != next.physical_id {
            info!(
                resource = %resource,
                from = %previous.physical_id,
                to = %next.physical_id,
                "Artifact physical id changed, retiring previous registration"
            );
            self.deregister(resource, previous_handle).await?;
        }
        Ok(handle)
    }

    /// Owning declaration deleted
    pub async fn on_delete(
        &self,
        resource: &ResourceId,
        handle: &ArtifactHandle,
    ) -> ProvisioningResult<()> {
        self.deregister(resource, handle).await
    }

    /// Current lifecycle state of `physical_id`
    pub async fn state(&self, physical_id: &PhysicalId) -> ArtifactState {
        self.tracked
            .lock()
            .await
            .get(physical_id)
            .map(|t| t.lifecycle.current_state().clone())
            .unwrap_or_default()
    }

    pub async fn history(&self, physical_id: &PhysicalId) -> ArtifactHistory {
        self.tracked
            .lock()
            .await
            .get(physical_id)
            .map(|t| t.lifecycle.history().to_vec())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_plane::{ControlPlaneError, InMemoryControlPlane};
    use crate::domain::ContentType;
    use pretty_assertions::assert_eq;

    fn registration(key: &str) -> ArtifactRegistration {
        ArtifactRegistration {
            physical_id: PhysicalId::new("plugin-A"),
            source: SourceLocation::new("plugins", key),
            metadata: ArtifactMetadata {
                logical_name: "s3-sink".to_string(),
                description: "connector plugin".to_string(),
                content_type: ContentType::Zip,
            },
        }
    }

    fn registrar() -> (Arc<InMemoryControlPlane>, ArtifactRegistrar<InMemoryControlPlane>) {
        let cp = Arc::new(InMemoryControlPlane::new("us-east-1", "123456789012"));
        let registrar = ArtifactRegistrar::new(Arc::clone(&cp), RetryPolicy::immediate(3));
        (cp, registrar)
    }

    #[tokio::test]
    async fn test_unchanged_inputs_skip_control_plane() {
        let (cp, registrar) = registrar();
        let id = ResourceId::new("plugin");

        let first = registrar.register(&id, &registration("v1.zip")).await.unwrap();
        let second = registrar.register(&id, &registration("v1.zip")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(cp.call_count("register_artifact").await, 1);
    }

    #[tokio::test]
    async fn test_failed_update_keeps_previous_revision_visible() {
        let (cp, registrar) = registrar();
        let id = ResourceId::new("plugin");
        let first = registrar.register(&id, &registration("v1.zip")).await.unwrap();

        cp.fail_next("register_artifact", ControlPlaneError::Rejected("bad zip".into()))
            .await;
        assert!(registrar.register(&id, &registration("v2.zip")).await.is_err());

        assert_eq!(
            registrar.state(&PhysicalId::new("plugin-A")).await,
            ArtifactState::Registered(first)
        );
    }

    #[tokio::test]
    async fn test_unfinished_registration_is_settled_before_next() {
        let (cp, registrar) = registrar();
        let id = ResourceId::new("plugin");
        {
            let mut tracked = registrar.tracked.lock().await;
            let entry = tracked
                .entry(PhysicalId::new("plugin-A"))
                .or_insert_with(Tracked::new);
            entry.step(&id, ArtifactInput::BeginRegistration).unwrap();
        }

        let handle = registrar.register(&id, &registration("v1.zip")).await.unwrap();

        assert_eq!(handle.revision, 1);
        assert_eq!(cp.call_count("register_artifact").await, 1);
        assert_eq!(
            registrar.state(&PhysicalId::new("plugin-A")).await,
            ArtifactState::Registered(handle)
        );
    }

    #[tokio::test]
    async fn test_history_records_each_step() {
        let (_cp, registrar) = registrar();
        let id = ResourceId::new("plugin");
        let handle = registrar.register(&id, &registration("v1.zip")).await.unwrap();
        registrar.deregister(&id, &handle).await.unwrap();

        let history = registrar.history(&PhysicalId::new("plugin-A")).await;
        assert_eq!(history.len(), 4);
        assert_eq!(history[3].to, ArtifactState::Absent);
    }
}
