// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use std::path::PathBuf;

use anyhow::{Result, bail};
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, RunMode};
use crate::config::loader::{default_config_path, load_and_validate};
use crate::config::model::ConfigFile;
use crate::dag::DependencyResolver;
use crate::engine::{AsyncExecutor, RunSummary};
use crate::exec::{ExecutionRequest, ExecutionResult, HostProcessAdapter, SyncExecutor, millis};
use crate::types::Variables;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - host adapter / sync executor / async executor
/// - Ctrl-C handling
/// - the selected run mode and JSON result reporting on stdout
pub async fn run(args: CliArgs) -> Result<RunSummary> {
    let config_path = args
        .config
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let cfg = load_and_validate(&config_path)?;

    let vars: Variables = args.vars.iter().cloned().collect();

    if args.dry_run {
        print_dry_run(&cfg, &args, &vars)?;
        return Ok(RunSummary::default());
    }

    let executor = build_executor(&cfg, args.max_concurrent)?;

    // Ctrl-C → cancel everything still queued or running.
    {
        let shutdown = executor.shutdown_token();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            warn!("Ctrl+C received; cancelling outstanding executions");
            shutdown.cancel();
        });
    }

    info!(mode = ?args.mode, tasks = ?args.tasks, "starting run");

    let results: Vec<ExecutionResult> = match args.mode {
        RunMode::Single => {
            let [name] = args.tasks.as_slice() else {
                bail!("--mode single needs exactly one --task (got {})", args.tasks.len());
            };
            let handle = executor.submit(cfg.request_for(name, &vars)?)?;
            vec![handle.wait().await]
        }
        RunMode::Batch => {
            let requests = selected_requests(&cfg, &args.tasks, &vars)?;
            executor.execute_batch(requests, args.fail_fast).await?
        }
        RunMode::Pipeline => {
            if args.tasks.is_empty() {
                bail!("--mode pipeline needs at least one --task");
            }
            let steps = selected_requests(&cfg, &args.tasks, &vars)?;
            executor.execute_pipeline(steps, !args.no_pass_output).await?
        }
        RunMode::Dag => {
            let graph = cfg.dependency_graph(&args.tasks, &vars)?;
            executor.execute_graph(graph).await?.into_values().collect()
        }
    };

    for result in &results {
        println!("{}", serde_json::to_string(result)?);
    }

    let summary = RunSummary::from_results(&results);
    info!(
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        timed_out = summary.timed_out,
        cancelled = summary.cancelled,
        retries = summary.retries,
        success_rate = summary.success_rate(),
        "run finished"
    );
    for (task, stats) in &summary.per_task {
        info!(
            task = %task,
            executions = stats.executions,
            succeeded = stats.succeeded,
            avg_ms = millis(stats.average_duration()),
            min_ms = millis(stats.min_duration),
            max_ms = millis(stats.max_duration),
            "flow timing"
        );
    }

    Ok(summary)
}

/// Build the executor stack described by `cfg`.
pub fn build_executor(cfg: &ConfigFile, max_concurrent: Option<usize>) -> Result<AsyncExecutor<HostProcessAdapter>> {
    let mut adapter = HostProcessAdapter::new(&cfg.engine.host).with_args(cfg.engine.host_args.iter().cloned());
    if let Some(dir) = &cfg.engine.working_dir {
        adapter = adapter.with_working_dir(dir);
    }

    let sync = SyncExecutor::new(adapter, cfg.retry.policy())
        .with_default_timeout(cfg.default_timeout())
        .with_default_retries(cfg.engine.default_retries);

    let limit = max_concurrent.unwrap_or(cfg.engine.max_concurrent);
    Ok(AsyncExecutor::new(sync, limit)?)
}

/// Requests for the named tasks, in the given order; all tasks when empty.
fn selected_requests(cfg: &ConfigFile, names: &[String], vars: &Variables) -> Result<Vec<ExecutionRequest>> {
    let requests = if names.is_empty() {
        cfg.task_names()
            .map(|name| cfg.request_for(name, vars))
            .collect::<crate::errors::Result<Vec<_>>>()?
    } else {
        names
            .iter()
            .map(|name| cfg.request_for(name, vars))
            .collect::<crate::errors::Result<Vec<_>>>()?
    };
    Ok(requests)
}

/// Simple dry-run output: print settings, tasks and the execution order.
fn print_dry_run(cfg: &ConfigFile, args: &CliArgs, vars: &Variables) -> Result<()> {
    println!("flowrun dry-run");
    println!("  engine.host = {}", cfg.engine.host);
    if !cfg.engine.host_args.is_empty() {
        println!("  engine.host_args = {:?}", cfg.engine.host_args);
    }
    println!(
        "  engine.max_concurrent = {}",
        args.max_concurrent.unwrap_or(cfg.engine.max_concurrent)
    );
    println!("  engine.default_timeout_secs = {}", cfg.engine.default_timeout_secs);
    println!("  engine.default_retries = {}", cfg.engine.default_retries);
    println!(
        "  retry = base {}ms, cap {}ms, max {}",
        cfg.retry.base_delay_ms, cfg.retry.max_delay_ms, cfg.retry.max_retries
    );
    println!("  mode = {:?}", args.mode);
    println!();

    println!("tasks ({}):", cfg.task.len());
    for (name, task) in cfg.task.iter() {
        println!("  - {name}");
        println!("      flow: {}", task.flow_id(name));
        if let Some(secs) = task.timeout_secs {
            println!("      timeout_secs: {secs}");
        }
        if let Some(retries) = task.retries {
            println!("      retries: {retries}");
        }
        if !task.after.is_empty() {
            println!("      after: {:?}", task.after);
        }
        if !task.inputs.is_empty() {
            println!("      inputs: {}", serde_json::to_string(&task.inputs)?);
        }
    }

    let resolved = DependencyResolver::validate(cfg.dependency_graph(&args.tasks, vars)?)?;
    let order: Vec<&str> = resolved
        .topological_order()
        .iter()
        .map(|&idx| resolved.node(idx).id.as_str())
        .collect();
    println!();
    println!("order: {}", order.join(" -> "));

    debug!("dry-run complete (no execution)");
    Ok(())
}
