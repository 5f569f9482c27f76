// Copyright (c) 2025 - Cowboy AI, Inc.
//! Exchange backed by a NATS JetStream key/value bucket

use async_nats::jetstream::{self, kv};
use async_trait::async_trait;
use tracing::{debug, info};

use super::{ExchangeError, ParameterKey, ValueExchange};
use crate::config::{ParameterBucketConfig, StorageType};
use crate::errors::TransportError;
use crate::nats::NatsClient;

/// Parameters stored as `msk/bootstrap-brokers`-style keys in one bucket
#[derive(Clone)]
pub struct NatsValueExchange {
    store: kv::Store,
}

impl NatsValueExchange {
    /// Bind to the bucket, creating it when it does not exist
    pub async fn connect(
        client: &NatsClient,
        config: &ParameterBucketConfig,
    ) -> Result<Self, TransportError> {
        let context = client.jetstream();
        let store = match context.get_key_value(config.bucket.as_str()).await {
            Ok(store) => store,
            Err(_) => {
                info!(bucket = %config.bucket, "Creating parameter bucket");
                context
                    .create_key_value(kv::Config {
                        bucket: config.bucket.clone(),
                        history: config.history,
                        storage: match config.storage {
                            StorageType::File => jetstream::stream::StorageType::File,
                            StorageType::Memory => jetstream::stream::StorageType::Memory,
                        },
                        num_replicas: config.replicas,
                        ..Default::default()
                    })
                    .await
                    .map_err(|e| TransportError::KeyValue(e.to_string()))?
            }
        };
        Ok(Self { store })
    }
}

#[async_trait]
impl ValueExchange for NatsValueExchange {
    async fn publish(&self, key: &ParameterKey, value: &str) -> Result<(), ExchangeError> {
        let revision = self
            .store
            .put(key.kv_key(), value.to_string().into())
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;
        debug!(key = %key, revision, "Published parameter");
        Ok(())
    }

    async fn resolve(&self, key: &ParameterKey) -> Result<String, ExchangeError> {
        let entry = self
            .store
            .get(key.kv_key())
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;
        let bytes = entry.ok_or_else(|| ExchangeError::NotFound { key: key.clone() })?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ExchangeError::Encoding { key: key.clone() })
    }

    async fn remove(&self, key: &ParameterKey) -> Result<(), ExchangeError> {
        self.store
            .delete(key.kv_key())
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))
    }
}
