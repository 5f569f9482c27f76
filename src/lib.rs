// Copyright (c) 2025 - Cowboy AI, Inc.
//! Provisioning for a managed Kafka cluster and its S3 sink connector
//!
//! Two deployment units are declared, ordered, applied and destroyed
//! against a control plane:
//!
//! - the streaming cluster unit (fabric, cluster, session-access host)
//! - the sink connector unit (bucket, identity, custom plugin, connector)
//!
//! The units share nothing in memory. The cluster unit publishes its
//! bootstrap address to a Durable Value Exchange; the connector unit reads
//! it back at deploy time.
//!
//! ## Architecture
//!
//! ```text
//! stacks ──► stack::DeploymentUnit ──► stack::ResourceGraph (creation order)
//!                    │
//!                    ▼
//!            stack::Deployer ──► provision::{Cluster,Connector}Provisioner
//!                    │                     provision::ArtifactRegistrar
//!                    │                               │
//!                    ▼                               ▼
//!            exchange::ValueExchange        control_plane::ControlPlane
//!            (NATS KV or in-memory)         (retried via retry)
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use msk_connect_infrastructure::{
//!     stacks, Deployer, DeploymentConfig, DeploymentState, InMemoryControlPlane,
//!     InMemoryValueExchange,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DeploymentConfig::from_env()?;
//! let control_plane = Arc::new(InMemoryControlPlane::new(
//!     config.target.region.clone(),
//!     config.target.account.clone(),
//! ));
//! let exchange = Arc::new(InMemoryValueExchange::new());
//! let deployer = Deployer::new(control_plane, exchange, &config);
//!
//! let unit = stacks::streaming_cluster_unit(&config.target, &Default::default())?;
//! let mut state = DeploymentState::new(unit.name.clone());
//! let report = deployer.deploy(&unit, &mut state).await?;
//! println!("{:?}", report.output(stacks::BOOTSTRAP_OUTPUT));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod control_plane;
pub mod domain;
pub mod errors;
pub mod events;
pub mod exchange;
pub mod nats;
pub mod provision;
pub mod retry;
pub mod stack;
pub mod stacks;
pub mod state_machine;
pub mod subjects;
pub mod telemetry;

// Re-export commonly used types
pub use config::{DeploymentConfig, ReadinessPolicy, TargetContext};
pub use control_plane::{ControlPlane, InMemoryControlPlane};
pub use errors::{ConfigError, ProvisioningError, ProvisioningResult};
pub use events::{EventPublisher, LifecycleOperation, ProvisioningEvent};
pub use exchange::{InMemoryValueExchange, NatsValueExchange, ParameterKey, ValueExchange};
pub use nats::{NatsClient, NatsConfig};
pub use retry::RetryPolicy;
pub use stack::{Deployer, DeploymentReport, DeploymentState, DeploymentUnit};
pub use telemetry::init_tracing;
