#![allow(dead_code)]

use std::collections::BTreeMap;

use flowrun::config::{ConfigFile, EngineSection, RawConfigFile, RetrySection, TaskConfig};
use flowrun::dag::{DependencyGraph, DependencyNode};
use flowrun::errors::Result;
use flowrun::exec::ExecutionRequest;
use flowrun::types::Variables;
use serde_json::Value;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                engine: EngineSection::default(),
                retry: RetrySection::default(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_host(mut self, host: &str) -> Self {
        self.config.engine.host = host.to_string();
        self
    }

    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.config.engine.max_concurrent = n;
        self
    }

    pub fn with_default_retries(mut self, n: u32) -> Self {
        self.config.engine.default_retries = n;
        self
    }

    pub fn with_retry(mut self, base_delay_ms: u64, max_delay_ms: u64, max_retries: u32) -> Self {
        self.config.retry = RetrySection {
            base_delay_ms,
            max_delay_ms,
            max_retries,
        };
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build().expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new() -> Self {
        Self {
            task: TaskConfig::default(),
        }
    }

    pub fn flow(mut self, flow: &str) -> Self {
        self.task.flow = Some(flow.to_string());
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.task.timeout_secs = Some(secs);
        self
    }

    pub fn retries(mut self, n: u32) -> Self {
        self.task.retries = Some(n);
        self
    }

    pub fn input(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.task.inputs.insert(key.to_string(), value.into());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

impl Default for TaskConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Graph over `(id, after)` pairs; each node runs a request named after it.
pub fn chain_graph(edges: &[(&str, &[&str])]) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for (id, after) in edges {
        let node = DependencyNode::new(*id, ExecutionRequest::new(*id, Variables::new()))
            .after(after.iter().copied());
        graph.add_node(node).expect("duplicate node in test graph");
    }
    graph
}
