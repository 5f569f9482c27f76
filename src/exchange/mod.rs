// Copyright (c) 2025 - Cowboy AI, Inc.
//! Durable Value Exchange
//!
//! A named key/value namespace shared by independently deployed units. A
//! producer publishes a value it only learns at deploy time (e.g. a
//! cluster's bootstrap address); a consumer in another unit resolves it.
//!
//! # Semantics
//!
//! - `publish` is an upsert; last writer wins, nothing is versioned
//! - `resolve` of a key nobody published yields [`ExchangeError::NotFound`],
//!   which is distinct from [`ExchangeError::Transport`]
//! - No read-after-write ordering across deployments is promised
//!
//! # Keys
//!
//! Keys are slash-delimited paths such as `/msk/bootstrap-brokers`.
//!
//! ```rust
//! use msk_connect_infrastructure::exchange::ParameterKey;
//!
//! let key = ParameterKey::new("/msk/bootstrap-brokers").unwrap();
//! assert_eq!(key.scope(), "msk");
//! assert_eq!(key.leaf(), "bootstrap-brokers");
//! assert!(ParameterKey::new("msk//brokers").is_err());
//! ```

pub mod memory;
pub mod nats;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::errors::ConfigError;

pub use memory::InMemoryValueExchange;
pub use nats::NatsValueExchange;

/// Hierarchical parameter key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParameterKey(String);

impl ParameterKey {
    /// Parse a key of the form `/segment/.../leaf`
    pub fn new(key: impl Into<String>) -> Result<Self, ConfigError> {
        let key = key.into();
        let invalid = |reason: &str| ConfigError::InvalidParameterKey {
            key: key.clone(),
            reason: reason.to_string(),
        };

        let path = key
            .strip_prefix('/')
            .ok_or_else(|| invalid("must start with '/'"))?;
        let segments: Vec<&str> = path.split('/').collect();
        if segments.len() < 2 {
            return Err(invalid("needs a scope and a leaf"));
        }
        for segment in &segments {
            if segment.is_empty() {
                return Err(invalid("empty segment"));
            }
            if segment.starts_with('.') || segment.ends_with('.') {
                return Err(invalid("segments may not start or end with '.'"));
            }
            if !segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '=' | '-'))
            {
                return Err(invalid("segments may only contain [A-Za-z0-9_.=-]"));
            }
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First path segment
    pub fn scope(&self) -> &str {
        self.segments().next().unwrap_or_default()
    }

    /// Last path segment
    pub fn leaf(&self) -> &str {
        self.segments().last().unwrap_or_default()
    }

    /// Key as stored in a NATS key/value bucket (`msk/bootstrap-brokers`)
    pub fn kv_key(&self) -> &str {
        self.0.trim_start_matches('/')
    }

    fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.trim_start_matches('/').split('/')
    }
}

impl fmt::Display for ParameterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ParameterKey {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ParameterKey> for String {
    fn from(value: ParameterKey) -> Self {
        value.0
    }
}

/// Exchange failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// The key has never been published (producer not deployed yet)
    #[error("Parameter {key} has not been published")]
    NotFound { key: ParameterKey },

    /// The exchange could not be reached or refused the request
    #[error("Value exchange transport error: {0}")]
    Transport(String),

    /// A stored value is not valid UTF-8
    #[error("Parameter {key} holds an undecodable value")]
    Encoding { key: ParameterKey },
}

impl ExchangeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ExchangeError::NotFound { .. })
    }
}

/// Named key/value store shared across deployment units
#[async_trait]
pub trait ValueExchange: Send + Sync {
    /// Upsert `value` under `key`
    async fn publish(&self, key: &ParameterKey, value: &str) -> Result<(), ExchangeError>;

    /// Current value of `key`
    async fn resolve(&self, key: &ParameterKey) -> Result<String, ExchangeError>;

    /// Remove `key`; removing an absent key succeeds
    async fn remove(&self, key: &ParameterKey) -> Result<(), ExchangeError>;
}

#[async_trait]
impl<T: ValueExchange + ?Sized> ValueExchange for std::sync::Arc<T> {
    async fn publish(&self, key: &ParameterKey, value: &str) -> Result<(), ExchangeError> {
        (**self).publish(key, value).await
    }

    async fn resolve(&self, key: &ParameterKey) -> Result<String, ExchangeError> {
        (**self).resolve(key).await
    }

    async fn remove(&self, key: &ParameterKey) -> Result<(), ExchangeError> {
        (**self).remove(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("/msk/bootstrap-brokers" => true ; "scope and leaf")]
    #[test_case("/a/b/c" => true ; "nested")]
    #[test_case("/msk/cluster.sg=1" => true ; "punctuation")]
    #[test_case("msk/brokers" => false ; "missing leading slash")]
    #[test_case("/msk" => false ; "missing leaf")]
    #[test_case("/msk//brokers" => false ; "empty segment")]
    #[test_case("/msk/bootstrap brokers" => false ; "whitespace")]
    #[test_case("/msk/" => false ; "trailing slash")]
    #[test_case("/.msk/brokers" => false ; "leading dot")]
    fn test_key_validation(key: &str) -> bool {
        ParameterKey::new(key).is_ok()
    }

    #[test]
    fn test_kv_key() {
        let key = ParameterKey::new("/msk/bootstrap-brokers").unwrap();
        assert_eq!(key.kv_key(), "msk/bootstrap-brokers");
    }

    #[test]
    fn test_key_serde_validates() {
        assert!(serde_json::from_str::<ParameterKey>("\"no-slash\"").is_err());
        let key: ParameterKey = serde_json::from_str("\"/msk/x\"").unwrap();
        assert_eq!(key.as_str(), "/msk/x");
    }
}
