// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error types for provisioning operations
//!
//! Errors are layered the same way the rest of the crate is:
//!
//! - [`ConfigError`] - a value object or environment setting is invalid
//! - [`TransportError`] - NATS connectivity and encoding failures
//! - [`ProvisioningError`] - the orchestration taxonomy. Every variant names
//!   the logical resource that failed.

use std::time::Duration;

use thiserror::Error;

use crate::domain::ResourceId;
use crate::state_machine::TransitionError;

/// Validation errors raised while constructing declarations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// CIDR block could not be parsed or has an out-of-range prefix
    #[error("Invalid CIDR block: {0}")]
    InvalidCidr(String),

    /// Parameter key does not follow the `/scope/leaf` convention
    #[error("Invalid parameter key {key:?}: {reason}")]
    InvalidParameterKey { key: String, reason: String },

    /// Required environment variable is not set
    #[error("Environment variable {0} is not set")]
    MissingEnvironment(&'static str),

    /// A field holds a value outside its allowed domain
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ConfigError {
    /// Shorthand for [`ConfigError::InvalidValue`]
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// NATS transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// NATS connection error
    #[error("NATS connection error: {0}")]
    NatsConnection(String),

    /// NATS publish error
    #[error("NATS publish error: {0}")]
    NatsPublish(String),

    /// JetStream key/value error
    #[error("JetStream key/value error: {0}")]
    KeyValue(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Serialization(err.to_string())
    }
}

/// Orchestration errors
///
/// Terminal variants (`Configuration`, `ControlPlaneRejected`,
/// `DependencyCycle`) will fail the same way on every re-run until the
/// declaration changes. `PrerequisiteUnresolved` and `ControlPlaneTransient`
/// can succeed on a later run.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// Invalid declaration, detected before any control-plane call
    #[error("Configuration error in {resource}: {reason}")]
    Configuration { resource: ResourceId, reason: String },

    /// A referenced value does not exist yet
    #[error("{resource} cannot proceed: prerequisite {prerequisite} is not available")]
    PrerequisiteUnresolved {
        resource: ResourceId,
        prerequisite: String,
    },

    /// Throttling or network failure that outlasted the retry budget
    #[error("{resource}: {operation} still failing after {attempts} attempt(s): {message}")]
    ControlPlaneTransient {
        resource: ResourceId,
        operation: String,
        attempts: u32,
        message: String,
    },

    /// The provider refused the requested configuration
    #[error("{resource}: control plane rejected {operation}: {reason}")]
    ControlPlaneRejected {
        resource: ResourceId,
        operation: String,
        reason: String,
    },

    /// Some resources of a unit were applied before another one failed
    #[error("Deployment of unit {unit} stopped at {failed}: {source}")]
    PartialDeployment {
        unit: String,
        failed: ResourceId,
        completed: Vec<ResourceId>,
        #[source]
        source: Box<ProvisioningError>,
    },

    /// The value exchange could not be reached
    #[error("{resource}: value exchange failure: {message}")]
    Exchange { resource: ResourceId, message: String },

    /// Implicit and explicit edges form a cycle
    #[error("Dependency cycle among {resources:?}")]
    DependencyCycle { resources: Vec<ResourceId> },

    /// A lifecycle state machine refused a transition
    #[error("{resource}: {source}")]
    InvalidTransition {
        resource: ResourceId,
        #[source]
        source: TransitionError,
    },

    /// Ledger (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for provisioning operations
pub type ProvisioningResult<T> = Result<T, ProvisioningError>;

impl ProvisioningError {
    /// Wrap a validation error for the given resource
    pub fn configuration(resource: &ResourceId, reason: impl ToString) -> Self {
        ProvisioningError::Configuration {
            resource: resource.clone(),
            reason: reason.to_string(),
        }
    }

    /// Report an unavailable prerequisite for the given resource
    pub fn unresolved(resource: &ResourceId, prerequisite: impl Into<String>) -> Self {
        ProvisioningError::PrerequisiteUnresolved {
            resource: resource.clone(),
            prerequisite: prerequisite.into(),
        }
    }

    /// The innermost error, looking through `PartialDeployment`
    pub fn root(&self) -> &ProvisioningError {
        match self {
            ProvisioningError::PartialDeployment { source, .. } => source.root(),
            other => other,
        }
    }

    /// The logical resource this error is about, if any
    pub fn resource(&self) -> Option<&ResourceId> {
        match self {
            ProvisioningError::Configuration { resource, .. }
            | ProvisioningError::PrerequisiteUnresolved { resource, .. }
            | ProvisioningError::ControlPlaneTransient { resource, .. }
            | ProvisioningError::ControlPlaneRejected { resource, .. }
            | ProvisioningError::Exchange { resource, .. }
            | ProvisioningError::InvalidTransition { resource, .. } => Some(resource),
            ProvisioningError::PartialDeployment { failed, .. } => Some(failed),
            ProvisioningError::DependencyCycle { .. } | ProvisioningError::Serialization(_) => {
                None
            }
        }
    }

    /// Whether re-running provisioning later can succeed without changing
    /// the declaration
    pub fn is_retryable(&self) -> bool {
        match self {
            ProvisioningError::PrerequisiteUnresolved { .. }
            | ProvisioningError::ControlPlaneTransient { .. }
            | ProvisioningError::Exchange { .. } => true,
            ProvisioningError::PartialDeployment { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Suggested delay before re-running a retryable deployment
    pub fn requeue_hint(&self) -> Option<Duration> {
        match self.root() {
            ProvisioningError::ControlPlaneTransient { .. } | ProvisioningError::Exchange { .. } => {
                Some(Duration::from_secs(30))
            }
            ProvisioningError::PrerequisiteUnresolved { .. } => Some(Duration::from_secs(300)),
            _ => None,
        }
    }
}
