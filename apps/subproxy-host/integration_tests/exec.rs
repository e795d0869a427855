use crate::helpers::{
    echo_factory, exec_factory, exec_only, host_program, kwargs, runner_factory,
};

use subproxy_host::targets::{runner, runner_constructor};

use subproxy_core::error::proxy::ProxyError;
use subproxy_core::error::spawn::SpawnError;
use subproxy_core::lifecycle::process::is_running;
use subproxy_core::protocol::RemoteErrorKind;
use subproxy_core::{SpawnStrategy, TargetConstructor};

use std::sync::Arc;
use std::thread;

use rand::Rng;
use serde_json::{Map, json};

/// **VALUE**: Verifies that the host binary serves a registered target when exec'd.
///
/// **WHY THIS MATTERS**: Exec is the default first strategy. If worker mode were broken, every
/// registered target would silently run under the fork fallback instead.
///
/// **BUG THIS CATCHES**: Would catch the worker flag not being recognised, logging leaking onto
/// stdout (corrupting the channel), or the bootstrap frame being misread.
#[test]
fn given_host_binary_when_spawning_runner_via_exec_then_worker_info_recorded() {
    // GIVEN: Exec-only configuration pointing at this crate's binary

    // WHEN: Spawning a runner
    let proxy = runner_factory()
        .spawn(vec![], Map::new())
        .expect("runner should spawn via exec");

    // THEN: Exec'd worker, named target, program recorded, defaults visible
    let info = proxy.info();
    assert_eq!(info.strategy, SpawnStrategy::Exec);
    assert_eq!(info.program.as_deref(), Some(host_program().as_path()));
    assert_eq!(info.target.as_deref(), Some("runner"));
    assert_ne!(info.pid, std::process::id());
    assert_eq!(proxy.get_attr("x").expect("x"), json!(5));
    assert_eq!(proxy.call("get_y", vec![]).expect("get_y"), json!(4));
}

/// **VALUE**: Verifies constructor arguments cross the process boundary.
#[test]
fn given_constructor_kwargs_when_spawning_via_exec_then_worker_sees_them() {
    // GIVEN: Overrides for every attribute
    let overrides = kwargs(&[
        ("x", json!(6)),
        ("y", json!(1)),
        ("z", json!({"a": 2, "b": 3})),
    ]);

    // WHEN: Spawning
    let proxy = runner_factory().spawn(vec![], overrides).expect("spawn");

    // THEN: The worker's instance was built with them
    assert_eq!(proxy.get_attr("x").expect("x"), json!(6));
    assert_eq!(proxy.get_attr("y").expect("y"), json!(1));
    assert_eq!(proxy.get_attr("z").expect("z"), json!({"a": 2, "b": 3}));
}

/// **VALUE**: Verifies writes through every access path land on the worker's instance.
///
/// **BUG THIS CATCHES**: Would catch set acknowledgements being sent before the write, or item
/// access not being routed to `__setitem__`.
#[test]
fn given_exec_runner_when_mutated_then_reads_reflect_writes() {
    // GIVEN: A runner
    let proxy = runner_factory().spawn(vec![], Map::new()).expect("spawn");

    // WHEN: Setting an attribute, calling a mutator, writing an item
    proxy.set("x", 7).expect("set x");
    proxy.call("set_y", vec![json!(15)]).expect("set_y");
    proxy
        .set_item("z", json!({"a": 3, "b": 4}))
        .expect("set_item");

    // THEN: Every read sees the new state
    assert_eq!(proxy.get_attr("x").expect("x"), json!(7));
    assert_eq!(proxy.call("get_y", vec![]).expect("get_y"), json!(15));
    assert_eq!(proxy.get_item("z").expect("get_item"), json!({"a": 3, "b": 4}));
}

/// **VALUE**: Verifies that a name the worker host does not know is not served by exec.
///
/// **WHY THIS MATTERS**: The exec'd program only knows its own registry. An unknown name must
/// fail the handshake (so another strategy can be tried), never construct something else.
///
/// **BUG THIS CATCHES**: Would catch the worker hanging on an unknown name, or the failure
/// being reported as a constructor error (which stops fallback).
#[test]
fn given_unregistered_name_when_spawning_exec_only_then_exhausted() {
    // GIVEN: A registered-style constructor the host binary does not have
    let factory = exec_factory(TargetConstructor::registered("missing", runner::build));

    // WHEN: Spawning with exec as the only strategy
    let err = factory.spawn(vec![], Map::new()).expect_err("should fail");

    // THEN: Strategies exhausted, exec failure named
    assert!(matches!(err, SpawnError::Exhausted { .. }), "got {err:?}");
    assert!(err.to_string().contains("exec:"), "got {err}");
}

/// **VALUE**: Verifies that constructor errors raised inside an exec'd worker are fatal.
#[test]
fn given_invalid_kwargs_when_spawning_via_exec_then_target_error() {
    // GIVEN: A keyword the runner does not have
    let bad = kwargs(&[("w", json!(1))]);

    // WHEN: Spawning
    let err = runner_factory().spawn(vec![], bad).expect_err("should fail");

    // THEN: Target error naming the keyword
    assert!(matches!(err, SpawnError::Target { .. }), "got {err:?}");
    assert!(err.to_string().contains("'w'"), "got {err}");
}

/// **VALUE**: Verifies that closing an exec'd worker's handle reaps the process.
#[test]
fn given_exec_worker_when_closed_then_process_reaped() {
    // GIVEN: A running exec'd worker
    let proxy = runner_factory().spawn(vec![], Map::new()).expect("spawn");
    let pid = proxy.pid();
    assert!(is_running(pid));

    // WHEN: Closing
    proxy.close().expect("close");

    // THEN: Gone
    assert!(!is_running(pid), "worker {pid} still running after close");
}

/// **VALUE**: Verifies request/response pairing under concurrent callers on an exec'd worker.
///
/// **WHY THIS MATTERS**: Pipes to an exec'd child buffer differently than a socketpair; a
/// framing bug that only shows up with partial reads would surface here.
///
/// **BUG THIS CATCHES**: Would catch responses being delivered to the wrong caller.
#[test]
fn given_shared_exec_echo_when_many_threads_call_then_each_gets_its_own_value() {
    const THREADS: usize = 8;
    const TOTAL_CALLS: usize = 400;

    // GIVEN: One exec'd echo worker shared across threads
    let echo = Arc::new(echo_factory().spawn(vec![], Map::new()).expect("spawn"));

    // WHEN: Each thread echoes distinct floats with a small random wait
    let workers: Vec<_> = (0..THREADS)
        .map(|thread_index| {
            let echo = Arc::clone(&echo);
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                (thread_index..TOTAL_CALLS)
                    .step_by(THREADS)
                    .filter_map(|call_index| {
                        let payload = call_index as f64 + rng.gen_range(0.0..1.0);
                        let wait = rng.gen_range(0.0..0.001);
                        let echoed = echo
                            .call("echo", vec![json!(payload), json!(wait)])
                            .expect("echo call");
                        (echoed != json!(payload)).then_some((payload, echoed))
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    // THEN: Nobody saw another caller's value
    let mismatches: Vec<_> = workers
        .into_iter()
        .flat_map(|worker| worker.join().expect("thread panicked"))
        .collect();
    assert!(mismatches.is_empty(), "mismatched responses: {mismatches:?}");
}

/// **VALUE**: Verifies that an exec'd worker uses the parent's frame limit and survives a
/// result above it.
///
/// **WHY THIS MATTERS**: The worker is a separate program that cannot see the parent's
/// config. If it kept its own default limit it would send frames the client must reject,
/// and the client would report transport errors for a live worker.
///
/// **BUG THIS CATCHES**: Would catch the limit missing from the bootstrap message, the
/// worker exiting on an unsendable response, or the client stream misaligned afterwards.
#[test]
fn given_small_frame_limit_when_exec_result_too_large_then_failed_and_handle_keeps_working() {
    // GIVEN: An exec'd runner limited to 4 KiB, with two attributes of 2500 bytes each
    let factory = exec_factory(runner_constructor())
        .with_config(exec_only().with_max_frame_bytes(4096));
    let proxy = factory.spawn(vec![], Map::new()).expect("spawn");
    let filler = "a".repeat(2500);
    proxy.set("x", &filler).expect("set x");
    proxy.set("y", &filler).expect("set y");

    // WHEN: Asking for every attribute in one response
    let err = proxy.call("snapshot", vec![]).expect_err("too large");

    // THEN: A remote failure from the worker, and the handle still works
    assert!(
        matches!(err, ProxyError::Remote { kind: RemoteErrorKind::Failed, .. }),
        "got {err:?}"
    );
    assert_eq!(proxy.get_attr("x").expect("x"), json!(filler));
    proxy.set("y", 1).expect("shrink y");
    proxy.set("x", 1).expect("shrink x");
    assert_eq!(
        proxy.call("snapshot", vec![]).expect("snapshot"),
        json!({"x": 1, "y": 1, "z": {"a": 1, "b": 2}})
    );
    assert!(proxy.is_worker_running());
}
