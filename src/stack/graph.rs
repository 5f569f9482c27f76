// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource dependency graph
//!
//! Nodes are logical resource ids; an edge `prerequisite → dependent` means
//! the dependent reads something the prerequisite produces (a reference) or
//! was declared to wait for it (explicit). Ordering is a pure function of
//! the graph: Kahn's algorithm, breaking ties by declaration order, so the
//! same unit always yields the same plan.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::domain::ResourceId;
use crate::errors::{ProvisioningError, ProvisioningResult};

/// Why an edge exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// The dependent's declaration references the prerequisite
    Reference,
    /// Declared with `depends_on`
    Explicit,
}

#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    graph: DiGraph<ResourceId, EdgeKind>,
    index: HashMap<ResourceId, NodeIndex>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Add a node; adding an existing id is a no-op
    pub fn add_resource(&mut self, id: ResourceId) -> NodeIndex {
        if let Some(&idx) = self.index.get(&id) {
            return idx;
        }
        let idx = self.graph.add_node(id.clone());
        self.index.insert(id, idx);
        idx
    }

    /// `dependent` must come after `prerequisite`
    ///
    /// A second edge between the same pair is ignored.
    pub fn add_edge(
        &mut self,
        prerequisite: &ResourceId,
        dependent: &ResourceId,
        kind: EdgeKind,
    ) -> ProvisioningResult<()> {
        let from = self.node(dependent, prerequisite)?;
        let to = self.node(dependent, dependent)?;
        if self.graph.find_edge(from, to).is_none() {
            self.graph.add_edge(from, to, kind);
        }
        Ok(())
    }

    fn node(&self, requester: &ResourceId, id: &ResourceId) -> ProvisioningResult<NodeIndex> {
        self.index.get(id).copied().ok_or_else(|| {
            ProvisioningError::configuration(requester, format!("{} is not declared in this unit", id))
        })
    }

    /// Direct prerequisites of `id`, in declaration order
    pub fn prerequisites(&self, id: &ResourceId) -> Vec<(ResourceId, EdgeKind)> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };
        let mut edges: Vec<(NodeIndex, EdgeKind)> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .map(|edge| (edge.source(), *edge.weight()))
            .collect();
        edges.sort_by_key(|(source, _)| source.index());
        edges
            .into_iter()
            .filter_map(|(source, kind)| self.graph.node_weight(source).map(|id| (id.clone(), kind)))
            .collect()
    }

    /// Every resource, prerequisites first
    ///
    /// Among resources that are ready at the same time, the one declared
    /// first goes first. A cycle is reported with every resource on or
    /// behind it.
    pub fn creation_order(&self) -> ProvisioningResult<Vec<ResourceId>> {
        let mut in_degree: Vec<usize> = vec![0; self.graph.node_count()];
        for edge in self.graph.edge_references() {
            in_degree[edge.target().index()] += 1;
        }

        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(idx, _)| idx)
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(next) = ready.pop_first() {
            let idx = NodeIndex::new(next);
            if let Some(id) = self.graph.node_weight(idx) {
                order.push(id.clone());
            }
            for neighbor in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                let degree = &mut in_degree[neighbor.index()];
                *degree = degree.saturating_sub(1);
                if *degree == 0 {
                    ready.insert(neighbor.index());
                }
            }
        }

        if order.len() != self.graph.node_count() {
            let resources = self
                .graph
                .node_indices()
                .filter(|idx| in_degree[idx.index()] > 0)
                .filter_map(|idx| self.graph.node_weight(idx).cloned())
                .collect();
            return Err(ProvisioningError::DependencyCycle { resources });
        }

        Ok(order)
    }

    /// Exact reverse of [`ResourceGraph::creation_order`]
    pub fn deletion_order(&self) -> ProvisioningResult<Vec<ResourceId>> {
        let mut order = self.creation_order()?;
        order.reverse();
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ids(names: &[&str]) -> Vec<ResourceId> {
        names.iter().map(|n| ResourceId::new(*n)).collect()
    }

    fn graph(nodes: &[&str]) -> ResourceGraph {
        let mut graph = ResourceGraph::new();
        for node in nodes {
            graph.add_resource(ResourceId::new(*node));
        }
        graph
    }

    #[test]
    fn test_reference_and_explicit_edges() {
        // B references A; C explicitly depends on A
        let mut g = graph(&["c", "b", "a"]);
        g.add_edge(&"a".into(), &"b".into(), EdgeKind::Reference).unwrap();
        g.add_edge(&"a".into(), &"c".into(), EdgeKind::Explicit).unwrap();

        let order = g.creation_order().unwrap();
        assert_eq!(order, ids(&["a", "c", "b"]));

        let mut reversed = g.deletion_order().unwrap();
        reversed.reverse();
        assert_eq!(reversed, order);
    }

    #[test]
    fn test_independent_resources_keep_declaration_order() {
        let g = graph(&["bucket", "role", "plugin"]);
        assert_eq!(g.creation_order().unwrap(), ids(&["bucket", "role", "plugin"]));
    }

    #[test]
    fn test_cycle_is_reported() {
        let mut g = graph(&["a", "b", "c"]);
        g.add_edge(&"a".into(), &"b".into(), EdgeKind::Reference).unwrap();
        g.add_edge(&"b".into(), &"a".into(), EdgeKind::Explicit).unwrap();
        g.add_edge(&"b".into(), &"c".into(), EdgeKind::Reference).unwrap();

        match g.creation_order() {
            Err(ProvisioningError::DependencyCycle { resources }) => {
                assert_eq!(resources, ids(&["a", "b", "c"]));
            }
            other => panic!("expected a cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_endpoint_is_configuration_error() {
        let mut g = graph(&["a"]);
        let err = g
            .add_edge(&"missing".into(), &"a".into(), EdgeKind::Explicit)
            .unwrap_err();
        assert!(matches!(err, ProvisioningError::Configuration { .. }));
    }

    #[test]
    fn test_duplicate_edge_is_ignored() {
        let mut g = graph(&["a", "b"]);
        g.add_edge(&"a".into(), &"b".into(), EdgeKind::Reference).unwrap();
        g.add_edge(&"a".into(), &"b".into(), EdgeKind::Explicit).unwrap();

        assert_eq!(g.edge_count(), 1);
        assert_eq!(
            g.prerequisites(&"b".into()),
            vec![(ResourceId::new("a"), EdgeKind::Reference)]
        );
    }
}
