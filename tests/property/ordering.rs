// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Dependency Ordering
//!
//! Random acyclic graphs are built by only adding edges from a lower to a
//! higher node number, then declaring the nodes in a shuffled order.

use msk_connect_infrastructure::domain::ResourceId;
use msk_connect_infrastructure::errors::ProvisioningError;
use msk_connect_infrastructure::stack::{EdgeKind, ResourceGraph};
use proptest::prelude::*;
use std::collections::HashMap;

// ============================================================================
// Strategies
// ============================================================================

#[derive(Debug, Clone)]
struct AcyclicGraph {
    /// Node numbers in declaration order
    declared: Vec<usize>,
    /// `(prerequisite, dependent)` with prerequisite < dependent
    edges: Vec<(usize, usize, EdgeKind)>,
}

fn edge_kind() -> impl Strategy<Value = EdgeKind> {
    prop_oneof![Just(EdgeKind::Reference), Just(EdgeKind::Explicit)]
}

fn acyclic_graph() -> impl Strategy<Value = AcyclicGraph> {
    (1usize..12).prop_flat_map(|n| {
        let declared = Just((0..n).collect::<Vec<_>>()).prop_shuffle();
        let edges = prop::collection::vec((0..n, 0..n, edge_kind()), 0..30).prop_map(|raw| {
            raw.into_iter()
                .filter(|(a, b, _)| a != b)
                .map(|(a, b, kind)| (a.min(b), a.max(b), kind))
                .collect::<Vec<_>>()
        });
        (declared, edges).prop_map(|(declared, edges)| AcyclicGraph { declared, edges })
    })
}

fn node(n: usize) -> ResourceId {
    ResourceId::new(format!("resource-{}", n))
}

fn build(spec: &AcyclicGraph) -> ResourceGraph {
    let mut graph = ResourceGraph::new();
    for n in &spec.declared {
        graph.add_resource(node(*n));
    }
    for (prerequisite, dependent, kind) in &spec.edges {
        graph
            .add_edge(&node(*prerequisite), &node(*dependent), *kind)
            .expect("Both endpoints are declared");
    }
    graph
}

fn positions(order: &[ResourceId]) -> HashMap<ResourceId, usize> {
    order
        .iter()
        .enumerate()
        .map(|(i, id)| (id.clone(), i))
        .collect()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Every prerequisite is created before its dependents
    #[test]
    fn prop_creation_respects_every_edge(spec in acyclic_graph()) {
        let order = build(&spec).creation_order().unwrap();
        prop_assert_eq!(order.len(), spec.declared.len());

        let at = positions(&order);
        for (prerequisite, dependent, _) in &spec.edges {
            prop_assert!(at[&node(*prerequisite)] < at[&node(*dependent)]);
        }
    }

    /// Deletion is the exact reverse of creation
    #[test]
    fn prop_deletion_reverses_creation(spec in acyclic_graph()) {
        let graph = build(&spec);
        let mut creation = graph.creation_order().unwrap();
        creation.reverse();
        prop_assert_eq!(graph.deletion_order().unwrap(), creation);
    }

    /// The same declarations always produce the same plan
    #[test]
    fn prop_ordering_is_deterministic(spec in acyclic_graph()) {
        prop_assert_eq!(
            build(&spec).creation_order().unwrap(),
            build(&spec).creation_order().unwrap()
        );
    }

    /// Without edges, declaration order is kept
    #[test]
    fn prop_unconstrained_resources_keep_declaration_order(
        declared in Just((0..10usize).collect::<Vec<_>>()).prop_shuffle()
    ) {
        let spec = AcyclicGraph { declared: declared.clone(), edges: Vec::new() };
        let expected: Vec<_> = declared.into_iter().map(node).collect();
        prop_assert_eq!(build(&spec).creation_order().unwrap(), expected);
    }

    /// Closing a chain into a loop is reported with every member
    #[test]
    fn prop_closed_chain_is_a_cycle(len in 2usize..10) {
        let mut graph = ResourceGraph::new();
        for n in 0..len {
            graph.add_resource(node(n));
        }
        for n in 1..len {
            graph.add_edge(&node(n - 1), &node(n), EdgeKind::Reference).unwrap();
        }
        graph.add_edge(&node(len - 1), &node(0), EdgeKind::Explicit).unwrap();

        match graph.creation_order() {
            Err(ProvisioningError::DependencyCycle { resources }) => {
                prop_assert_eq!(resources.len(), len);
            }
            other => prop_assert!(false, "expected a cycle, got {:?}", other),
        }
    }
}
