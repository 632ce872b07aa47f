// src/config/model.rs

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::dag::{DependencyGraph, DependencyNode};
use crate::errors::{FlowrunError, Result};
use crate::exec::{ExecutionRequest, RetryPolicy};
use crate::types::{TaskDescriptor, Variables};

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [engine]
/// host = "flow-host"
/// max_concurrent = 4
///
/// [retry]
/// base_delay_ms = 500
///
/// [task.extract]
/// flow = "ExtractInvoices"
/// timeout_secs = 60
///
/// [task.load]
/// after = ["extract"]
/// ```
///
/// All sections except `[task.*]` are optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub retry: RetrySection,

    /// Keys are the *task names* used by `--task` and `after`.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>` (see `validate.rs`), so
/// holders can rely on every task converting into a valid request and on the
/// task graph being acyclic.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub engine: EngineSection,
    pub retry: RetrySection,
    pub task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        engine: EngineSection,
        retry: RetrySection,
        task: BTreeMap<String, TaskConfig>,
    ) -> Self {
        Self { engine, retry, task }
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.engine.default_timeout_secs)
    }

    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.task.keys().map(String::as_str)
    }

    /// Descriptor for the task registered under `name`.
    pub fn descriptor(&self, name: &str) -> Result<TaskDescriptor> {
        self.task
            .get(name)
            .map(|task| task.descriptor(name))
            .ok_or_else(|| FlowrunError::TaskNotFound(name.to_string()))
    }

    /// Execution request for `name`, with `extra` inputs layered on top.
    pub fn request_for(&self, name: &str, extra: &Variables) -> Result<ExecutionRequest> {
        Ok(self.descriptor(name)?.to_request().with_inputs(extra.clone()))
    }

    /// Build a dependency graph over `selection` and everything it
    /// (transitively) depends on. An empty selection means every task.
    ///
    /// Node ids are task names; `after` edges are copied as-is.
    pub fn dependency_graph(&self, selection: &[String], extra: &Variables) -> Result<DependencyGraph> {
        let included: BTreeSet<&str> = if selection.is_empty() {
            self.task_names().collect()
        } else {
            let mut seen = BTreeSet::new();
            let mut stack: Vec<&str> = selection.iter().map(String::as_str).collect();
            while let Some(name) = stack.pop() {
                let (key, task) = self
                    .task
                    .get_key_value(name)
                    .ok_or_else(|| FlowrunError::TaskNotFound(name.to_string()))?;
                if seen.insert(key.as_str()) {
                    stack.extend(task.after.iter().map(String::as_str));
                }
            }
            seen
        };

        let mut graph = DependencyGraph::new();
        for name in included {
            let task = &self.task[name];
            let node = DependencyNode::new(name, self.request_for(name, extra)?).after(task.after.iter().cloned());
            graph.add_node(node)?;
        }
        Ok(graph)
    }
}

/// `[engine]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSection {
    /// Program invoked once per attempt.
    #[serde(default = "default_host")]
    pub host: String,

    /// Arguments placed before `--flow <id> --inputs <json>`.
    #[serde(default)]
    pub host_args: Vec<String>,

    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,

    #[serde(default)]
    pub default_retries: u32,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_host() -> String {
    "flow-host".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_concurrent() -> usize {
    5
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            host_args: Vec::new(),
            working_dir: None,
            default_timeout_secs: default_timeout_secs(),
            default_retries: 0,
            max_concurrent: default_max_concurrent(),
        }
    }
}

/// `[retry]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySection {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_max_retries() -> u32 {
    10
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_retries: default_max_retries(),
        }
    }
}

impl RetrySection {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            self.max_retries,
        )
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    /// Canonical flow identifier passed to the host.
    ///
    /// If `None`, the table key is used.
    #[serde(default)]
    pub flow: Option<String>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub retries: Option<u32>,

    /// Tasks that must succeed before this one runs (`after = ["A", "B"]`).
    #[serde(default)]
    pub after: Vec<String>,

    #[serde(default)]
    pub inputs: Variables,
}

impl TaskConfig {
    pub fn flow_id<'a>(&'a self, name: &'a str) -> &'a str {
        self.flow.as_deref().unwrap_or(name)
    }

    pub fn descriptor(&self, name: &str) -> TaskDescriptor {
        TaskDescriptor {
            id: self.flow_id(name).to_string(),
            inputs: self.inputs.clone(),
            timeout: self.timeout_secs.map(Duration::from_secs),
            retries: self.retries,
        }
    }
}
