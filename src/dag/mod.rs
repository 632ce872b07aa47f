// src/dag/mod.rs

//! Dependency graphs and their scheduling.
//!
//! - [`graph`] holds the caller-facing, name-keyed graph.
//! - [`resolver`] validates it (missing references, cycles) into an
//!   index-based [`ResolvedGraph`] and computes ready sets.
//! - [`scheduler`] contains the per-run state machine that releases ready
//!   nodes and cancels dependents of failed ones.

pub mod graph;
pub mod resolver;
pub mod scheduler;

pub use graph::{DependencyGraph, DependencyNode};
pub use petgraph::graph::NodeIndex;
pub use resolver::{DependencyResolver, ResolvedGraph};
pub use scheduler::{DagScheduler, NodeState};
