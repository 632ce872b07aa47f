// src/dag/graph.rs

use std::collections::HashSet;

use crate::errors::{FlowrunError, Result};
use crate::exec::ExecutionRequest;
use crate::types::TaskId;

/// One node of a dependency graph.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyNode {
    /// Node identifier, unique within the graph.
    pub id: TaskId,
    /// Request run when the node is released.
    pub request: ExecutionRequest,
    /// Nodes that must succeed before this one may run.
    pub after: Vec<TaskId>,
}

impl DependencyNode {
    pub fn new(id: impl Into<TaskId>, request: ExecutionRequest) -> Self {
        Self {
            id: id.into(),
            request,
            after: Vec::new(),
        }
    }

    pub fn after<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskId>,
    {
        self.after.extend(deps.into_iter().map(Into::into));
        self
    }
}

/// Unvalidated, name-keyed dependency graph as submitted by a caller.
///
/// Node order is insertion order. Structural checks (dangling references,
/// cycles) happen in [`DependencyResolver::validate`](super::DependencyResolver::validate).
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<DependencyNode>,
    ids: HashSet<TaskId>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; node ids must be unique.
    pub fn add_node(&mut self, node: DependencyNode) -> Result<()> {
        if !self.ids.insert(node.id.clone()) {
            return Err(FlowrunError::InvalidRequest(format!(
                "duplicate node '{}' in dependency graph",
                node.id
            )));
        }
        self.nodes.push(node);
        Ok(())
    }

    /// Builder-style variant of [`add_node`](Self::add_node).
    pub fn with_node(mut self, node: DependencyNode) -> Result<Self> {
        self.add_node(node)?;
        Ok(self)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[DependencyNode] {
        &self.nodes
    }

    pub(crate) fn into_nodes(self) -> Vec<DependencyNode> {
        self.nodes
    }
}
