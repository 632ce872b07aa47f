// tests/property_scheduler.rs

use std::collections::HashSet;
use std::time::Duration;

use flowrun::dag::{DagScheduler, DependencyGraph, DependencyResolver, NodeState};
use flowrun::exec::RetryPolicy;
use flowrun::exec::output::parse_output;
use flowrun_test_utils::chain_graph;
use proptest::prelude::*;
use serde_json::json;

// Strategy to generate a valid DAG.
// We ensure acyclicity by only allowing node N to depend on nodes 0..N-1.
fn dag_strategy(max_nodes: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_nodes).prop_flat_map(|num_nodes| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..num_nodes), num_nodes)
            .prop_map(|raw_deps| {
                raw_deps
                    .into_iter()
                    .enumerate()
                    .map(|(i, potential)| {
                        let deps: HashSet<usize> = potential
                            .into_iter()
                            .filter(|_| i > 0)
                            .map(|d| d % i.max(1))
                            .collect();
                        deps.into_iter().collect()
                    })
                    .collect()
            })
    })
}

fn build_graph(deps: &[Vec<usize>]) -> DependencyGraph {
    let names: Vec<String> = (0..deps.len()).map(|i| format!("node_{i}")).collect();
    let edges: Vec<(&str, Vec<&str>)> = deps
        .iter()
        .enumerate()
        .map(|(i, ds)| (names[i].as_str(), ds.iter().map(|&d| names[d].as_str()).collect()))
        .collect();
    let borrowed: Vec<(&str, &[&str])> = edges.iter().map(|(n, ds)| (*n, ds.as_slice())).collect();
    chain_graph(&borrowed)
}

proptest! {
    #[test]
    fn test_scheduler_terminates_and_respects_dependencies(
        deps in dag_strategy(12),
        failing in proptest::collection::hash_set(0..12usize, 0..4),
    ) {
        let resolved = DependencyResolver::validate(build_graph(&deps)).unwrap();
        let mut scheduler = DagScheduler::new(&resolved);

        let mut released: HashSet<String> = HashSet::new();
        let mut succeeded: HashSet<String> = HashSet::new();
        let mut rounds = 0;

        loop {
            let ready = scheduler.next_ready();
            if ready.is_empty() {
                break;
            }
            rounds += 1;
            prop_assert!(rounds <= deps.len(), "more rounds than nodes");

            for &idx in &ready {
                let id = resolved.node(idx).id.clone();
                // Released at most once, and only after all dependencies succeeded.
                prop_assert!(released.insert(id.clone()), "{} released twice", id);
                for dep in resolved.dependencies_of(idx) {
                    prop_assert!(succeeded.contains(&resolved.node(dep).id));
                }
            }

            for idx in ready {
                let id = resolved.node(idx).id.clone();
                let n: usize = id.trim_start_matches("node_").parse().unwrap();
                if failing.contains(&n) {
                    for cancelled in scheduler.mark_failed(idx) {
                        prop_assert_eq!(scheduler.state_of(cancelled), NodeState::Cancelled);
                    }
                } else {
                    scheduler.mark_succeeded(idx);
                    succeeded.insert(id);
                }
            }
        }

        scheduler.cancel_remaining();
        prop_assert!(scheduler.is_finished());

        for idx in resolved.indices() {
            let state = scheduler.state_of(idx);
            let deps_ok = resolved
                .dependencies_of(idx)
                .all(|d| scheduler.state_of(d) == NodeState::Succeeded);
            match state {
                // A node is cancelled exactly when some dependency did not succeed.
                NodeState::Cancelled => prop_assert!(!deps_ok),
                NodeState::Succeeded | NodeState::Failed => prop_assert!(deps_ok),
                NodeState::Pending | NodeState::Running => prop_assert!(false, "non-terminal state"),
            }
        }
    }

    #[test]
    fn test_topological_order_puts_dependencies_first(deps in dag_strategy(15)) {
        let resolved = DependencyResolver::validate(build_graph(&deps)).unwrap();
        let order = resolved.topological_order();
        prop_assert_eq!(order.len(), deps.len());

        let position = |idx| order.iter().position(|&o| o == idx).unwrap();
        for idx in resolved.indices() {
            for dep in resolved.dependencies_of(idx) {
                prop_assert!(position(dep) < position(idx));
            }
        }
    }

    #[test]
    fn test_backoff_is_monotonic_and_capped(
        base_ms in 1u64..2_000,
        cap_ms in 1u64..20_000,
        attempt in 0u32..64,
    ) {
        let policy = RetryPolicy::new(Duration::from_millis(base_ms), Duration::from_millis(cap_ms), 10);
        let cap = policy.max_delay();

        let now = policy.backoff_delay(attempt);
        let next = policy.backoff_delay(attempt + 1);
        prop_assert!(now <= cap);
        prop_assert!(next >= now);
        prop_assert!(policy.backoff_delay(0) >= Duration::from_millis(base_ms.min(cap.as_millis() as u64)));
    }

    #[test]
    fn test_key_value_lines_parse_back(
        pairs in proptest::collection::btree_map("[a-z][a-z0-9_]{0,8}", any::<i64>(), 0..8),
    ) {
        let stdout: String = pairs.iter().map(|(k, v)| format!("{k}={v}\n")).collect();
        let parsed = parse_output(&stdout).unwrap();

        prop_assert_eq!(parsed.len(), pairs.len());
        for (k, v) in &pairs {
            prop_assert_eq!(&parsed[k], &json!(v));
        }
    }
}
