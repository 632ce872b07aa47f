// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};
use serde_json::Value;

use crate::exec::output::parse_value;

/// Command-line arguments for `flowrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "flowrun",
    version,
    about = "Run automation flows through a host program with retries, timeouts and dependencies.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `$FLOWRUN_CONFIG`, else `Flowrun.toml` in the current
    /// working directory.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// How the selected tasks are executed.
    #[arg(long, value_enum, default_value_t = RunMode::Dag)]
    pub mode: RunMode,

    /// Task to run (repeatable). Order matters for `pipeline`.
    #[arg(long = "task", value_name = "NAME")]
    pub tasks: Vec<String>,

    /// Extra input applied to every selected task. Values that parse as
    /// JSON keep their type.
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, Value)>,

    /// Batch mode: stop launching new tasks after the first failure.
    #[arg(long)]
    pub fail_fast: bool,

    /// Pipeline mode: do not feed step outputs into the next step.
    #[arg(long)]
    pub no_pass_output: bool,

    /// Override `[engine].max_concurrent`.
    #[arg(long, value_name = "N")]
    pub max_concurrent: Option<usize>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `FLOWRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the plan, but don't execute anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Execution mode.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum RunMode {
    /// Exactly one task.
    Single,
    /// Independent tasks in parallel.
    Batch,
    /// Tasks in sequence, outputs chained.
    Pipeline,
    /// Tasks plus their dependencies, respecting `after`.
    Dag,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Parse one `KEY=VALUE` pair.
pub fn parse_var(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty variable name in '{raw}'"));
    }
    Ok((key.to_string(), parse_value(value)))
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
