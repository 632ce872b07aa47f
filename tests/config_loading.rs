// tests/config_loading.rs

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use flowrun::config::loader::config_path_from;
use flowrun::config::{load_and_validate, parse_str};
use flowrun::config::ConfigFile;
use flowrun::errors::FlowrunError;
use flowrun::types::Variables;
use flowrun_test_utils::{ConfigFileBuilder, TaskConfigBuilder, vars};
use serde_json::json;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

fn load(contents: &str) -> Result<ConfigFile, FlowrunError> {
    let file = write_config(contents);
    load_and_validate(file.path())
}

#[test]
fn test_full_config_round_trips_into_model() {
    let cfg = load(
        r#"
[engine]
host = "/usr/local/bin/flow-host"
host_args = ["--profile", "ci"]
working_dir = "/srv/flows"
default_timeout_secs = 120
default_retries = 1
max_concurrent = 3

[retry]
base_delay_ms = 200
max_delay_ms = 800
max_retries = 4

[task.extract]
flow = "ExtractInvoices"
timeout_secs = 60
retries = 2
[task.extract.inputs]
month = "2024-01"
limit = 50

[task.load]
after = ["extract"]
"#,
    )
    .unwrap();

    assert_eq!(cfg.engine.host, "/usr/local/bin/flow-host");
    assert_eq!(cfg.engine.host_args, vec!["--profile", "ci"]);
    assert_eq!(cfg.engine.working_dir, Some(PathBuf::from("/srv/flows")));
    assert_eq!(cfg.default_timeout(), Duration::from_secs(120));
    assert_eq!(cfg.engine.max_concurrent, 3);

    let policy = cfg.retry.policy();
    assert_eq!(policy.base_delay(), Duration::from_millis(200));
    assert_eq!(policy.max_delay(), Duration::from_millis(800));
    assert_eq!(policy.max_retries(), 4);

    let extract = cfg.descriptor("extract").unwrap();
    assert_eq!(extract.id, "ExtractInvoices");
    assert_eq!(extract.timeout, Some(Duration::from_secs(60)));
    assert_eq!(extract.retries, Some(2));
    assert_eq!(extract.inputs, vars([("limit", json!(50)), ("month", json!("2024-01"))]));

    // Flow id falls back to the table key.
    assert_eq!(cfg.descriptor("load").unwrap().id, "load");
}

#[test]
fn test_defaults_apply_when_sections_are_missing() {
    let cfg = load(
        r#"
[task.only]
"#,
    )
    .unwrap();

    assert_eq!(cfg.engine.host, "flow-host");
    assert!(cfg.engine.host_args.is_empty());
    assert_eq!(cfg.engine.default_timeout_secs, 300);
    assert_eq!(cfg.engine.default_retries, 0);
    assert_eq!(cfg.engine.max_concurrent, 5);
    assert_eq!(cfg.retry.base_delay_ms, 1000);
    assert_eq!(cfg.retry.max_delay_ms, 10_000);
    assert_eq!(cfg.retry.max_retries, 10);
}

#[test]
fn test_dag_cycle_returns_structured_error() {
    let result = load(
        r#"
[task.A]
after = ["B"]

[task.B]
after = ["A"]
"#,
    );

    match result {
        Err(FlowrunError::CycleDetected(node)) => assert!(node == "A" || node == "B"),
        Err(e) => panic!("Expected CycleDetected error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_self_dependency_is_a_cycle() {
    let result = load(
        r#"
[task.A]
after = ["A"]
"#,
    );

    assert!(matches!(result, Err(FlowrunError::CycleDetected(ref n)) if n == "A"));
}

#[test]
fn test_unknown_dependency_returns_missing_dependency() {
    let result = load(
        r#"
[task.A]
after = ["NonExistent"]
"#,
    );

    match result {
        Err(FlowrunError::MissingDependency { task, dependency }) => {
            assert_eq!(task, "A");
            assert_eq!(dependency, "NonExistent");
        }
        Err(e) => panic!("Expected MissingDependency error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_config_without_tasks_is_rejected() {
    let result = load(
        r#"
[engine]
host = "flow-host"
"#,
    );

    assert!(matches!(result, Err(FlowrunError::ConfigError(_))));
}

#[test]
fn test_engine_bounds_are_checked() {
    let cases = [
        ("[engine]\nmax_concurrent = 0\n[task.A]\n", "max_concurrent"),
        ("[engine]\nhost = \"  \"\n[task.A]\n", "host"),
        ("[engine]\ndefault_timeout_secs = 0\n[task.A]\n", "default_timeout_secs"),
        ("[engine]\ndefault_timeout_secs = 7201\n[task.A]\n", "default_timeout_secs"),
        ("[engine]\ndefault_retries = 3\n[retry]\nmax_retries = 2\n[task.A]\n", "default_retries"),
        ("[retry]\nbase_delay_ms = 500\nmax_delay_ms = 100\n[task.A]\n", "max_delay_ms"),
    ];

    for (toml, needle) in cases {
        match load(toml) {
            Err(FlowrunError::ConfigError(msg)) => {
                assert!(msg.contains(needle), "message {msg:?} should mention {needle}")
            }
            other => panic!("Expected ConfigError for {toml:?}, got: {other:?}"),
        }
    }
}

#[test]
fn test_invalid_task_request_names_the_task() {
    let cases = [
        "[task.slow]\ntimeout_secs = 0\n",
        "[task.slow]\nretries = 11\n",
        "[task.slow]\nflow = \"has spaces\"\n",
    ];

    for toml in cases {
        match load(toml) {
            Err(FlowrunError::ConfigError(msg)) => assert!(msg.contains("task.slow"), "got {msg:?}"),
            other => panic!("Expected ConfigError for {toml:?}, got: {other:?}"),
        }
    }
}

#[test]
fn test_unknown_fields_are_rejected() {
    let err = parse_str("[task.A]\ncmd = \"echo A\"\n").unwrap_err();

    assert!(matches!(err, FlowrunError::TomlError(_)));
}

#[test]
fn test_missing_file_is_io_error() {
    let err = load_and_validate("/definitely/not/here/Flowrun.toml").unwrap_err();

    assert!(matches!(err, FlowrunError::IoError(_)));
}

#[test]
fn test_dependency_graph_pulls_in_predecessors() {
    let cfg = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::new().build())
        .with_task("b", TaskConfigBuilder::new().after("a").build())
        .with_task("c", TaskConfigBuilder::new().after("b").build())
        .with_task("unrelated", TaskConfigBuilder::new().build())
        .build();

    let graph = cfg.dependency_graph(&["c".to_string()], &Variables::new()).unwrap();
    let mut ids: Vec<&str> = graph.nodes().iter().map(|n| n.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["a", "b", "c"]);

    let everything = cfg.dependency_graph(&[], &Variables::new()).unwrap();
    assert_eq!(everything.len(), 4);
}

#[test]
fn test_request_for_layers_extra_inputs() {
    let cfg = ConfigFileBuilder::new()
        .with_task(
            "report",
            TaskConfigBuilder::new()
                .flow("MonthlyReport")
                .input("month", "2024-01")
                .input("format", "pdf")
                .timeout_secs(30)
                .build(),
        )
        .build();

    let req = cfg
        .request_for("report", &vars([("month", json!("2024-02"))]))
        .unwrap();

    assert_eq!(req.task_id(), "MonthlyReport");
    assert_eq!(req.timeout(), Some(Duration::from_secs(30)));
    assert_eq!(req.inputs()["month"], json!("2024-02"));
    assert_eq!(req.inputs()["format"], json!("pdf"));

    let err = cfg.request_for("nope", &Variables::new()).unwrap_err();
    assert!(matches!(err, FlowrunError::TaskNotFound(ref t) if t == "nope"));
}

#[test]
fn test_builder_config_validates_like_files() {
    let result = ConfigFileBuilder::new()
        .with_task("A", TaskConfigBuilder::new().after("B").build())
        .with_task("B", TaskConfigBuilder::new().after("A").build())
        .try_build();

    assert!(matches!(result, Err(FlowrunError::CycleDetected(_))));
}

#[test]
fn test_default_config_path_resolution() {
    assert_eq!(config_path_from(None), PathBuf::from("Flowrun.toml"));
    assert_eq!(config_path_from(Some(PathBuf::new())), PathBuf::from("Flowrun.toml"));
    assert_eq!(
        config_path_from(Some(PathBuf::from("ci/Flowrun.toml"))),
        PathBuf::from("ci/Flowrun.toml")
    );
}
