// src/dag/scheduler.rs

use std::collections::HashSet;

use petgraph::graph::NodeIndex;
use tracing::{debug, info, warn};

use crate::dag::resolver::{DependencyResolver, ResolvedGraph};

/// Per-run state of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Waiting on dependencies.
    Pending,
    /// Released to the executor.
    Running,
    Succeeded,
    /// Finished with Failed / TimedOut, or cancelled while running.
    Failed,
    /// Never launched because a dependency did not succeed.
    Cancelled,
}

impl NodeState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, NodeState::Pending | NodeState::Running)
    }
}

/// Per-run state machine over a [`ResolvedGraph`].
///
/// It is responsible for:
/// - releasing nodes whose dependencies all succeeded
/// - recording outcomes
/// - cancelling every transitive dependent of a node that did not succeed
#[derive(Debug)]
pub struct DagScheduler<'g> {
    graph: &'g ResolvedGraph,
    states: Vec<NodeState>,
    succeeded: HashSet<NodeIndex>,
    started: HashSet<NodeIndex>,
}

impl<'g> DagScheduler<'g> {
    pub fn new(graph: &'g ResolvedGraph) -> Self {
        Self {
            graph,
            states: vec![NodeState::Pending; graph.len()],
            succeeded: HashSet::new(),
            started: HashSet::new(),
        }
    }

    pub fn state_of(&self, idx: NodeIndex) -> NodeState {
        self.states[idx.index()]
    }

    /// Collect all currently-ready nodes, mark them `Running` and return them.
    pub fn next_ready(&mut self) -> Vec<NodeIndex> {
        // Cancelled nodes count as started so they are never released.
        let ready = DependencyResolver::ready_nodes(self.graph, &self.succeeded, &self.started);

        for &idx in &ready {
            debug!(node = %self.graph.node(idx).id, "dependencies satisfied; marking Running");
            self.states[idx.index()] = NodeState::Running;
            self.started.insert(idx);
        }

        ready
    }

    pub fn mark_succeeded(&mut self, idx: NodeIndex) {
        self.states[idx.index()] = NodeState::Succeeded;
        self.succeeded.insert(idx);
    }

    /// Record a failure and cancel every transitive dependent still pending.
    ///
    /// Returns the newly cancelled nodes (excluding `idx` itself).
    pub fn mark_failed(&mut self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.states[idx.index()] = NodeState::Failed;
        warn!(
            node = %self.graph.node(idx).id,
            "node did not succeed; cancelling its dependents"
        );

        let mut stack: Vec<NodeIndex> = self.graph.dependents_of(idx).collect();
        let mut newly_cancelled = Vec::new();

        while let Some(dep) = stack.pop() {
            match self.states[dep.index()] {
                NodeState::Pending => {
                    self.states[dep.index()] = NodeState::Cancelled;
                    self.started.insert(dep);
                    debug!(
                        node = %self.graph.node(dep).id,
                        "marking dependent as Cancelled due to upstream failure"
                    );
                    newly_cancelled.push(dep);
                    stack.extend(self.graph.dependents_of(dep));
                }
                // Already terminal, or released before the failure was known.
                NodeState::Running
                | NodeState::Succeeded
                | NodeState::Failed
                | NodeState::Cancelled => {}
            }
        }

        newly_cancelled
    }

    /// Cancel whatever is still pending (used when the run stops early).
    pub fn cancel_remaining(&mut self) -> Vec<NodeIndex> {
        let remaining: Vec<NodeIndex> = self
            .graph
            .indices()
            .filter(|idx| self.states[idx.index()] == NodeState::Pending)
            .collect();
        for &idx in &remaining {
            self.states[idx.index()] = NodeState::Cancelled;
            self.started.insert(idx);
        }
        if !remaining.is_empty() {
            info!(count = remaining.len(), "cancelled unreachable nodes");
        }
        remaining
    }

    pub fn is_finished(&self) -> bool {
        self.states.iter().all(|s| s.is_terminal())
    }
}
