// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for msk-connect-infrastructure
//!
//! Deterministic targets, registrations and a deployer wired to in-memory
//! backends. Policies never sleep, so scenario tests run instantly.
#![allow(dead_code)]

use std::sync::Arc;
use tokio::sync::Mutex;

use async_trait::async_trait;
use msk_connect_infrastructure::config::{DeploymentConfig, ReadinessPolicy, TargetContext};
use msk_connect_infrastructure::control_plane::InMemoryControlPlane;
use msk_connect_infrastructure::domain::{
    ArtifactMetadata, ArtifactRegistration, ContentType, PhysicalId, SourceLocation,
};
use msk_connect_infrastructure::errors::TransportError;
use msk_connect_infrastructure::events::{EventPublisher, ProvisioningEvent};
use msk_connect_infrastructure::exchange::{InMemoryValueExchange, ParameterKey};
use msk_connect_infrastructure::retry::RetryPolicy;
use msk_connect_infrastructure::stack::Deployer;

pub const REGION: &str = "us-east-1";
pub const ACCOUNT: &str = "123456789012";

pub type TestDeployer = Deployer<InMemoryControlPlane, InMemoryValueExchange>;

pub fn target() -> TargetContext {
    TargetContext::new(REGION, ACCOUNT)
}

/// Three attempts per call, no sleeping
pub fn config() -> DeploymentConfig {
    DeploymentConfig::new(target())
        .with_retry(RetryPolicy::immediate(3))
        .with_readiness(ReadinessPolicy::immediate(5))
}

pub fn control_plane() -> Arc<InMemoryControlPlane> {
    Arc::new(InMemoryControlPlane::new(REGION, ACCOUNT).with_cluster_ready_after(1))
}

/// Backends plus a deployer over them
pub struct Harness {
    pub control_plane: Arc<InMemoryControlPlane>,
    pub exchange: Arc<InMemoryValueExchange>,
    pub deployer: TestDeployer,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_control_plane(control_plane())
    }

    pub fn with_control_plane(control_plane: Arc<InMemoryControlPlane>) -> Self {
        let exchange = Arc::new(InMemoryValueExchange::new());
        let deployer = Deployer::new(Arc::clone(&control_plane), Arc::clone(&exchange), &config());
        Self {
            control_plane,
            exchange,
            deployer,
        }
    }

    /// Fresh deployer over the same backends, as a second process would be
    pub fn restarted(&self) -> TestDeployer {
        Deployer::new(
            Arc::clone(&self.control_plane),
            Arc::clone(&self.exchange),
            &config(),
        )
    }
}

pub fn plugin_registration(key: &str) -> ArtifactRegistration {
    ArtifactRegistration {
        physical_id: PhysicalId::new("customConnectorPlugin"),
        source: SourceLocation::new("msk-connect-plugin-bucket", key),
        metadata: ArtifactMetadata {
            logical_name: "kafka-connect-connector-plugin".to_string(),
            description: "connector plugin".to_string(),
            content_type: ContentType::Zip,
        },
    }
}

pub fn key(key: &str) -> ParameterKey {
    ParameterKey::new(key).expect("Invalid parameter key in test fixture")
}

/// Keeps every published event
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<ProvisioningEvent>>,
}

impl RecordingPublisher {
    pub async fn events(&self) -> Vec<ProvisioningEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &ProvisioningEvent) -> Result<(), TransportError> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

/// Fails every publish
pub struct UnreachablePublisher;

#[async_trait]
impl EventPublisher for UnreachablePublisher {
    async fn publish(&self, _event: &ProvisioningEvent) -> Result<(), TransportError> {
        Err(TransportError::NatsPublish("connection refused".to_string()))
    }
}
