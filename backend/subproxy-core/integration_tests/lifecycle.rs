use crate::helpers::{runner_factory, spawn_runner};

use subproxy_core::lifecycle::process::is_running;
use subproxy_core::{ProxyConfig, SpawnStrategy, TerminationSignal};

use serde_json::{Map, json};

/// **VALUE**: Verifies that closing a handle terminates and reaps its worker.
///
/// **WHY THIS MATTERS**: Handle and worker have a 1:1 lifetime. A leaked worker per handle
/// would exhaust processes in long-running hosts.
///
/// **BUG THIS CATCHES**: Would catch a close that signals but never waits (leaving a zombie),
/// or one that does nothing.
#[test]
fn given_live_handle_when_closed_then_worker_no_longer_running() {
    // GIVEN: A running worker
    let runner = spawn_runner();
    let pid = runner.pid();
    assert!(runner.is_worker_running());
    assert!(is_running(pid));

    // WHEN: Closing the handle
    runner.close().expect("close");

    // THEN: The worker is gone
    assert!(!is_running(pid), "worker {pid} still running after close");
}

/// **VALUE**: Verifies that dropping a handle has the same effect as closing it.
#[test]
fn given_live_handle_when_dropped_then_worker_no_longer_running() {
    // GIVEN: A running worker
    let runner = spawn_runner();
    let pid = runner.pid();

    // WHEN: Dropping the handle
    drop(runner);

    // THEN: The worker is gone
    assert!(!is_running(pid), "worker {pid} still running after drop");
}

/// **VALUE**: Verifies that SIGKILL teardown also reaps the worker.
#[test]
fn given_kill_signal_config_when_closed_then_worker_reaped() {
    // GIVEN: A runner configured for SIGKILL
    let config = ProxyConfig::default()
        .with_strategies(vec![SpawnStrategy::Fork])
        .with_termination_signal(TerminationSignal::Kill);
    let runner = runner_factory()
        .with_config(config)
        .spawn(vec![], Map::new())
        .expect("spawn");
    let pid = runner.pid();

    // WHEN: Closing
    runner.close().expect("close");

    // THEN: Gone
    assert!(!is_running(pid));
}

/// **VALUE**: Verifies that two handles of the same target are fully independent.
///
/// **WHY THIS MATTERS**: Each handle owns its own worker and instance. Shared state would
/// break isolation, the whole point of the proxy.
///
/// **BUG THIS CATCHES**: Would catch workers being reused across spawns, or one handle's
/// teardown taking the other's worker with it.
#[test]
fn given_two_handles_when_one_mutated_and_closed_then_other_unaffected() {
    // GIVEN: Two runners
    let first = spawn_runner();
    let second = spawn_runner();
    assert_ne!(first.pid(), second.pid());

    // WHEN: Mutating and closing the first
    first.set("y", 99).expect("set");
    first.close().expect("close");

    // THEN: The second still has its own state and is alive
    assert_eq!(second.get_attr("y").expect("y"), json!(4));
    assert!(second.is_worker_running());
}

/// **VALUE**: Verifies the recorded worker description.
#[test]
fn given_forked_worker_when_inspecting_info_then_describes_process() {
    let runner = spawn_runner();

    let info = runner.info();

    assert_eq!(info.pid, runner.pid());
    assert_eq!(info.strategy, SpawnStrategy::Fork);
    assert!(info.program.is_none());
    assert!(info.target.is_none());
    assert_ne!(info.pid, std::process::id());
}
