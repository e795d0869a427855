use crate::helpers::runner_factory;

use subproxy_host::demo::{Snapshot, run_scenario};
use subproxy_host::targets::runner_constructor;

use subproxy_core::{ProxyConfig, SpawnStrategy, wrap};

use serde_json::json;

fn snapshot(x: i64, y: i64, a: i64, b: i64) -> Snapshot {
    Snapshot {
        x: json!(x),
        y: json!(y),
        z: json!({"a": a, "b": b}),
    }
}

/// **VALUE**: End-to-end check of the walk-through: construct, mutate one runner, compare.
///
/// **WHY THIS MATTERS**: This is the behaviour users see first. Two runners built with the same
/// arguments must live in separate workers and must not share state, and editing a returned
/// value must not reach the worker.
///
/// **BUG THIS CATCHES**: Would catch two handles sharing one worker, returned values aliasing
/// worker state, or a mutation path (attribute, method, item) silently dropping writes.
#[test]
fn given_exec_factory_when_running_scenario_then_only_mutated_runner_changes() {
    // GIVEN: Exec-only runner factory

    // WHEN: Running the walk-through
    let report = run_scenario(&runner_factory()).expect("scenario");

    // THEN: Mutations land on the first runner only
    assert_eq!(report.initial, snapshot(6, 4, 1, 2));
    assert_eq!(report.mutated, snapshot(7, 15, 3, 4));
    assert_eq!(report.untouched, snapshot(6, 4, 1, 2));
    assert_ne!(report.worker_pids.0, report.worker_pids.1);
}

/// **VALUE**: Verifies the walk-through gives identical results under the fork strategy.
#[test]
fn given_fork_factory_when_running_scenario_then_same_report_values() {
    // GIVEN: Fork-only runner factory
    let factory = wrap(runner_constructor())
        .with_config(ProxyConfig::default().with_strategies(vec![SpawnStrategy::Fork]));

    // WHEN: Running the walk-through
    let report = run_scenario(&factory).expect("scenario");

    // THEN: Same observable state as exec
    assert_eq!(report.initial, snapshot(6, 4, 1, 2));
    assert_eq!(report.mutated, snapshot(7, 15, 3, 4));
    assert_eq!(report.untouched, snapshot(6, 4, 1, 2));
}
