// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deployment units and their execution
//!
//! - [`DeploymentUnit`] - declarations plus explicit ordering edges
//! - [`ResourceGraph`] - deterministic creation/deletion order
//! - [`DeploymentState`] - ledger carried between runs
//! - [`Deployer`] - applies and destroys units
//! - [`Outputs`] - resolved values flowing to dependents

pub mod deployer;
pub mod graph;
pub mod outputs;
pub mod state;
pub mod unit;

pub use deployer::{Deployer, DeploymentReport, ResourceAction};
pub use graph::{EdgeKind, ResourceGraph};
pub use outputs::{ClusterOutput, OutputAttribute, Outputs, ResourceOutput, UnitOutput};
pub use state::{DeploymentState, ResourceRecord};
pub use unit::DeploymentUnit;
