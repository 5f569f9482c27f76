// Copyright (c) 2025 - Cowboy AI, Inc.
//! Process-wide in-memory exchange
//!
//! Clones share one namespace, so a producer unit and a consumer unit handed
//! clones of the same exchange see each other's values.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::{ExchangeError, ParameterKey, ValueExchange};

#[derive(Debug, Clone, Default)]
pub struct InMemoryValueExchange {
    values: Arc<RwLock<HashMap<ParameterKey, String>>>,
    offline: Arc<AtomicBool>,
}

impl InMemoryValueExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with a transport error until switched back
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Snapshot of every stored key
    pub async fn keys(&self) -> Vec<ParameterKey> {
        let mut keys: Vec<_> = self.values.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn check_online(&self) -> Result<(), ExchangeError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ExchangeError::Transport("exchange is unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ValueExchange for InMemoryValueExchange {
    async fn publish(&self, key: &ParameterKey, value: &str) -> Result<(), ExchangeError> {
        self.check_online()?;
        self.values
            .write()
            .await
            .insert(key.clone(), value.to_string());
        debug!(key = %key, "Published parameter");
        Ok(())
    }

    async fn resolve(&self, key: &ParameterKey) -> Result<String, ExchangeError> {
        self.check_online()?;
        self.values
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| ExchangeError::NotFound { key: key.clone() })
    }

    async fn remove(&self, key: &ParameterKey) -> Result<(), ExchangeError> {
        self.check_online()?;
        self.values.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn key() -> ParameterKey {
        ParameterKey::new("/msk/bootstrap-brokers").unwrap()
    }

    #[tokio::test]
    async fn test_resolve_before_publish_is_not_found() {
        let exchange = InMemoryValueExchange::new();
        let err = assert_err!(exchange.resolve(&key()).await);
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let exchange = InMemoryValueExchange::new();
        assert_ok!(exchange.publish(&key(), "a:9094").await);
        assert_ok!(exchange.publish(&key(), "b:9094").await);
        assert_eq!(exchange.resolve(&key()).await.unwrap(), "b:9094");
    }

    #[tokio::test]
    async fn test_clones_share_namespace() {
        let producer = InMemoryValueExchange::new();
        let consumer = producer.clone();
        producer.publish(&key(), "b-1:9094").await.unwrap();
        assert_eq!(consumer.resolve(&key()).await.unwrap(), "b-1:9094");
    }

    #[tokio::test]
    async fn test_offline_is_transport_error() {
        let exchange = InMemoryValueExchange::new();
        exchange.set_offline(true);
        let err = assert_err!(exchange.resolve(&key()).await);
        assert!(matches!(err, ExchangeError::Transport(_)));
    }

    #[tokio::test]
    async fn test_remove_absent_key_succeeds() {
        let exchange = InMemoryValueExchange::new();
        assert_ok!(exchange.remove(&key()).await);
    }
}
