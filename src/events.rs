// Copyright (c) 2025 - Cowboy AI, Inc.
//! Provisioning Lifecycle Events
//!
//! Every resource step of a deployer run is journaled as an immutable
//! [`ProvisioningEvent`]. Events of one run share a correlation id; each
//! event's causation id is the event emitted before it in the same run.
//!
//! ```text
//! deploy(msk-connect)            correlation_id: run-1
//!   bucket    created            event_id: evt-1, causation_id: None
//!   identity  created            event_id: evt-2, causation_id: evt-1
//!   connector created            event_id: evt-3, causation_id: evt-2
//! ```
//!
//! Events are returned in the run's report and, when a publisher is
//! configured, sent on `provisioning.{unit}.{kind}.{operation}`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{ResourceId, ResourceKind};
use crate::errors::TransportError;
use crate::nats::NatsClient;
use crate::subjects::ProvisioningSubject;

/// What happened to a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleOperation {
    Created,
    Updated,
    /// Declaration unchanged since the last run; nothing was called
    Unchanged,
    Deleted,
    /// Left in place on destroy
    Retained,
    /// Bound to an existing resource the unit does not own
    Resolved,
    Failed,
}

impl LifecycleOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
            Self::Deleted => "deleted",
            Self::Retained => "retained",
            Self::Resolved => "resolved",
            Self::Failed => "failed",
        }
    }
}

/// Journal entry for one resource step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisioningEvent {
    /// Unique event ID (UUID v7 for time-ordering)
    pub event_id: Uuid,
    /// Shared by all events of one run
    pub correlation_id: Uuid,
    /// Previous event of the same run
    pub causation_id: Option<Uuid>,
    pub unit: String,
    pub resource: ResourceId,
    pub kind: ResourceKind,
    pub operation: LifecycleOperation,
    /// Physical id or failure message
    pub detail: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl ProvisioningEvent {
    pub fn subject(&self) -> ProvisioningSubject {
        ProvisioningSubject::new(&self.unit, self.kind, self.operation)
    }
}

/// Builds the event chain of one run
#[derive(Debug, Clone)]
pub struct EventJournal {
    unit: String,
    correlation_id: Uuid,
    events: Vec<ProvisioningEvent>,
}

impl EventJournal {
    pub fn new(unit: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            correlation_id: Uuid::now_v7(),
            events: Vec::new(),
        }
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// Append an event and return it
    pub fn record(
        &mut self,
        resource: &ResourceId,
        kind: ResourceKind,
        operation: LifecycleOperation,
        detail: Option<String>,
    ) -> &ProvisioningEvent {
        let event = ProvisioningEvent {
            event_id: Uuid::now_v7(),
            correlation_id: self.correlation_id,
            causation_id: self.events.last().map(|e| e.event_id),
            unit: self.unit.clone(),
            resource: resource.clone(),
            kind,
            operation,
            detail,
            occurred_at: Utc::now(),
        };
        debug!(
            unit = %event.unit,
            resource = %event.resource,
            operation = event.operation.as_str(),
            "Recorded provisioning event"
        );
        self.events.push(event);
        &self.events[self.events.len() - 1]
    }

    pub fn events(&self) -> &[ProvisioningEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<ProvisioningEvent> {
        self.events
    }
}

/// Sink for lifecycle events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &ProvisioningEvent) -> Result<(), TransportError>;
}

/// Publishes events as JSON on their provisioning subject
#[derive(Clone)]
pub struct NatsEventPublisher {
    client: NatsClient,
}

impl NatsEventPublisher {
    pub fn new(client: NatsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventPublisher for NatsEventPublisher {
    async fn publish(&self, event: &ProvisioningEvent) -> Result<(), TransportError> {
        self.client
            .publish(&event.subject().to_string(), event)
            .await
    }
}
