// Copyright (c) 2025 - Cowboy AI, Inc.
//! NATS client used by the exchange and event publishing

use async_nats::{jetstream, Client, ConnectOptions};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::TransportError;

/// Where the parameter bucket and event subjects live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NatsConfig {
    pub servers: Vec<String>,
    /// Shown in server connection listings
    pub name: String,
    pub connect_timeout: Duration,
    /// Upper bound for KV and JetStream API requests
    pub request_timeout: Duration,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            servers: vec!["nats://localhost:4222".to_string()],
            name: "msk-connect-provisioner".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl NatsConfig {
    /// Replace the server list (comma-separated URLs are split)
    pub fn with_servers(mut self, servers: &str) -> Self {
        self.servers = servers
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Thin wrapper over the async-nats client
#[derive(Clone)]
pub struct NatsClient {
    client: Client,
}

impl NatsClient {
    /// Connect with the given configuration
    pub async fn new(config: NatsConfig) -> Result<Self, TransportError> {
        let options = ConnectOptions::new()
            .name(&config.name)
            .connection_timeout(config.connect_timeout)
            .request_timeout(Some(config.request_timeout));

        let client = async_nats::connect_with_options(config.servers.join(","), options)
            .await
            .map_err(|e| TransportError::NatsConnection(e.to_string()))?;

        info!(servers = ?config.servers, name = %config.name, "Connected to NATS");

        Ok(Self { client })
    }

    /// Publish a JSON-encoded message to a subject
    pub async fn publish<T>(&self, subject: &str, message: &T) -> Result<(), TransportError>
    where
        T: Serialize,
    {
        let payload = serde_json::to_vec(message)?;

        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|e| TransportError::NatsPublish(e.to_string()))?;

        debug!(subject, "Published");
        Ok(())
    }

    /// JetStream context over this connection
    pub fn jetstream(&self) -> jetstream::Context {
        jetstream::new(self.client.clone())
    }
}
