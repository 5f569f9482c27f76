// Copyright (c) 2025 - Cowboy AI, Inc.
//! Durable Value Exchange
//!
//! The in-memory exchange runs everywhere. The NATS-backed exchange needs a
//! JetStream-enabled server at `NATS_URL` (default `nats://localhost:4222`):
//!
//! ```bash
//! nats-server -js &
//! cargo test --test exchange_tests -- --ignored
//! ```

mod fixtures;

use fixtures::key;
use msk_connect_infrastructure::config::ParameterBucketConfig;
use msk_connect_infrastructure::exchange::{
    ExchangeError, InMemoryValueExchange, NatsValueExchange, ValueExchange,
};
use msk_connect_infrastructure::nats::{NatsClient, NatsConfig};
use pretty_assertions::assert_eq;
use tokio_test::{assert_err, assert_ok};

const BOOTSTRAP: &str = "b-1.msk-cluster.kafka.us-east-1.amazonaws.com:9094,\
                         b-2.msk-cluster.kafka.us-east-1.amazonaws.com:9094";

#[tokio::test]
async fn test_consumer_sees_what_producer_published() {
    // Given a producer and a consumer handed clones of one exchange
    let producer = InMemoryValueExchange::new();
    let consumer = producer.clone();
    let bootstrap = key("/msk/bootstrap-brokers");

    // When the consumer resolves before anything was published
    let err = assert_err!(consumer.resolve(&bootstrap).await);

    // Then the key is reported as not yet published
    assert!(matches!(err, ExchangeError::NotFound { .. }));

    // When the producer publishes
    assert_ok!(producer.publish(&bootstrap, BOOTSTRAP).await);

    // Then the consumer reads the identical string
    assert_eq!(consumer.resolve(&bootstrap).await.unwrap(), BOOTSTRAP);
}

#[tokio::test]
async fn test_keys_are_independent() {
    let exchange = InMemoryValueExchange::new();
    assert_ok!(exchange.publish(&key("/msk/bootstrap-brokers"), BOOTSTRAP).await);

    let err = assert_err!(exchange.resolve(&key("/msk/cluster-security-group")).await);
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_removed_key_is_not_found_and_removal_repeats() {
    let exchange = InMemoryValueExchange::new();
    let bootstrap = key("/msk/bootstrap-brokers");
    assert_ok!(exchange.publish(&bootstrap, BOOTSTRAP).await);

    assert_ok!(exchange.remove(&bootstrap).await);
    assert_ok!(exchange.remove(&bootstrap).await);

    assert!(assert_err!(exchange.resolve(&bootstrap).await).is_not_found());
    assert!(exchange.keys().await.is_empty());
}

#[tokio::test]
async fn test_unreachable_exchange_is_a_transport_error() {
    let exchange = InMemoryValueExchange::new();
    exchange.set_offline(true);

    let err = assert_err!(exchange.resolve(&key("/msk/bootstrap-brokers")).await);
    assert!(matches!(err, ExchangeError::Transport(_)));
    assert!(!err.is_not_found());
}

#[tokio::test]
#[ignore] // Requires a JetStream-enabled NATS server
async fn test_nats_exchange_round_trip() {
    // Given a connection to the parameter bucket
    let url = std::env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string());
    let client = NatsClient::new(NatsConfig::default().with_servers(&url).with_name("exchange-test"))
        .await
        .expect("Failed to connect to NATS");
    let config = ParameterBucketConfig::default().with_bucket("msk-parameters-test");
    let exchange = NatsValueExchange::connect(&client, &config)
        .await
        .expect("Failed to bind parameter bucket");
    let bootstrap = key("/msk/bootstrap-brokers");
    assert_ok!(exchange.remove(&bootstrap).await);

    // When a value is published
    assert_ok!(exchange.publish(&bootstrap, BOOTSTRAP).await);

    // Then it resolves unchanged and disappears once removed
    assert_eq!(exchange.resolve(&bootstrap).await.unwrap(), BOOTSTRAP);
    assert_ok!(exchange.remove(&bootstrap).await);
    assert!(assert_err!(exchange.resolve(&bootstrap).await).is_not_found());
}
