// Copyright (c) 2025 - Cowboy AI, Inc.
//! Provisioners
//!
//! One provisioner per resource with behavior beyond a single control-plane
//! call:
//!
//! - [`ArtifactRegistrar`] - lifecycle of custom artifacts
//! - [`ClusterProvisioner`] - create and wait for the bootstrap address
//! - [`ConnectorProvisioner`] - resolve prerequisites, then declare
//!
//! Every control-plane call goes through [`crate::retry`], so throttling is
//! absorbed here and never reaches the deployer.

pub mod cluster;
pub mod connector;
pub mod registrar;

pub use cluster::ClusterProvisioner;
pub use connector::ConnectorProvisioner;
pub use registrar::{ArtifactHistory, ArtifactRegistrar};

use tracing::debug;

use crate::domain::ResourceId;
use crate::errors::{ProvisioningError, ProvisioningResult};
use crate::exchange::{ExchangeError, ParameterKey, ValueExchange};

/// Read `key` from the exchange on behalf of `resource`
///
/// A key that was never published is an unresolved prerequisite; anything
/// else is an exchange failure.
pub async fn resolve_parameter<X: ValueExchange + ?Sized>(
    exchange: &X,
    resource: &ResourceId,
    key: &ParameterKey,
) -> ProvisioningResult<String> {
    let value = exchange
        .resolve(key)
        .await
        .map_err(|e| exchange_error(resource, e))?;
    debug!(resource = %resource, key = %key, "Resolved parameter");
    Ok(value)
}

/// Write `value` under `key` on behalf of `resource`
pub async fn publish_parameter<X: ValueExchange + ?Sized>(
    exchange: &X,
    resource: &ResourceId,
    key: &ParameterKey,
    value: &str,
) -> ProvisioningResult<()> {
    exchange
        .publish(key, value)
        .await
        .map_err(|e| exchange_error(resource, e))?;
    debug!(resource = %resource, key = %key, "Published parameter");
    Ok(())
}

/// Remove `key`; a key that is already gone counts as removed
pub async fn remove_parameter<X: ValueExchange + ?Sized>(
    exchange: &X,
    resource: &ResourceId,
    key: &ParameterKey,
) -> ProvisioningResult<()> {
    match exchange.remove(key).await {
        Ok(()) | Err(ExchangeError::NotFound { .. }) => {
            debug!(resource = %resource, key = %key, "Removed parameter");
            Ok(())
        }
        Err(other) => Err(exchange_error(resource, other)),
    }
}

fn exchange_error(resource: &ResourceId, error: ExchangeError) -> ProvisioningError {
    match error {
        ExchangeError::NotFound { key } => {
            ProvisioningError::unresolved(resource, format!("parameter {}", key))
        }
        other => ProvisioningError::Exchange {
            resource: resource.clone(),
            message: other.to_string(),
        },
    }
}
