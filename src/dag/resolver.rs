// src/dag/resolver.rs

//! Graph validation and readiness computation.

use std::collections::{HashMap, HashSet};

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::dag::graph::{DependencyGraph, DependencyNode};
use crate::errors::{FlowrunError, Result};

/// Validated graph in index form.
///
/// Edge direction: dependency -> dependent. For `B.after = ["A"]` we add the
/// edge `A -> B`. Node weights are positions in `nodes`, so a `NodeIndex`
/// addresses both the petgraph node and its [`DependencyNode`].
#[derive(Debug, Clone)]
pub struct ResolvedGraph {
    graph: DiGraph<usize, ()>,
    nodes: Vec<DependencyNode>,
    order: Vec<NodeIndex>,
}

impl ResolvedGraph {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: NodeIndex) -> &DependencyNode {
        &self.nodes[self.graph[idx]]
    }

    /// All node indices in insertion order.
    pub fn indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    /// A valid execution order (every dependency before its dependents).
    pub fn topological_order(&self) -> &[NodeIndex] {
        &self.order
    }

    /// Immediate dependencies of `idx`.
    pub fn dependencies_of(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(idx, Direction::Incoming)
    }

    /// Immediate dependents of `idx`.
    pub fn dependents_of(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(idx, Direction::Outgoing)
    }
}

/// Validates dependency graphs and decides which nodes may run next.
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyResolver;

impl DependencyResolver {
    /// Check that every predecessor exists and that the graph is acyclic.
    ///
    /// Runs before anything is launched, so an invalid graph never starts
    /// partial execution.
    pub fn validate(graph: DependencyGraph) -> Result<ResolvedGraph> {
        let nodes = graph.into_nodes();

        let mut pg: DiGraph<usize, ()> = DiGraph::with_capacity(nodes.len(), 0);
        let mut by_id: HashMap<&str, NodeIndex> = HashMap::with_capacity(nodes.len());
        for (pos, node) in nodes.iter().enumerate() {
            let idx = pg.add_node(pos);
            by_id.insert(node.id.as_str(), idx);
        }

        for node in nodes.iter() {
            let to = by_id[node.id.as_str()];
            for dep in node.after.iter() {
                let Some(&from) = by_id.get(dep.as_str()) else {
                    return Err(FlowrunError::MissingDependency {
                        task: node.id.clone(),
                        dependency: dep.clone(),
                    });
                };
                if from == to {
                    return Err(FlowrunError::CycleDetected(node.id.clone()));
                }
                pg.update_edge(from, to, ());
            }
        }

        // A topological sort fails iff there is a cycle.
        let order = toposort(&pg, None)
            .map_err(|cycle| FlowrunError::CycleDetected(nodes[pg[cycle.node_id()]].id.clone()))?;

        debug!(nodes = nodes.len(), edges = pg.edge_count(), "dependency graph validated");

        Ok(ResolvedGraph {
            graph: pg,
            nodes,
            order,
        })
    }

    /// Nodes whose dependencies are all in `completed` and which are not in
    /// `started`, in insertion order.
    ///
    /// `completed` holds nodes that finished *successfully*; `started` holds
    /// every node already released (running or finished, whatever the outcome).
    pub fn ready_nodes(
        graph: &ResolvedGraph,
        completed: &HashSet<NodeIndex>,
        started: &HashSet<NodeIndex>,
    ) -> Vec<NodeIndex> {
        graph
            .indices()
            .filter(|idx| !started.contains(idx))
            .filter(|&idx| graph.dependencies_of(idx).all(|dep| completed.contains(&dep)))
            .collect()
    }
}
