use crate::helpers::{build_runner, fork_only, runner_factory, spawn_runner};

use subproxy_core::error::proxy::ProxyError;
use subproxy_core::error::spawn::SpawnError;
use subproxy_core::error::target::TargetError;
use subproxy_core::protocol::RemoteErrorKind;
use subproxy_core::{ProxyConfig, SpawnStrategy, TargetConstructor, Target, wrap};

use serde_json::{Map, json};

/// **VALUE**: Verifies that a failing or panicking method costs one call, not the worker.
///
/// **WHY THIS MATTERS**: The worker exists to contain faults. If a target error ended the
/// dispatch loop, every later call on the handle would fail with a transport error.
///
/// **BUG THIS CATCHES**: Would catch missing per-request error capture in the worker.
#[test]
fn given_failing_methods_when_called_then_errors_returned_and_worker_survives() {
    // GIVEN: A runner
    let runner = spawn_runner();

    // WHEN: Calling a failing method and a panicking one
    let failed = runner.call("explode", vec![]).expect_err("explode");
    let panicked = runner.call("panic", vec![]).expect_err("panic");

    // THEN: Both are tagged remote errors and the worker still answers
    assert!(
        matches!(failed, ProxyError::Remote { kind: RemoteErrorKind::Failed, .. }),
        "got {failed:?}"
    );
    assert!(
        matches!(panicked, ProxyError::Remote { kind: RemoteErrorKind::Panicked, .. }),
        "got {panicked:?}"
    );
    assert_eq!(runner.get_attr("x").expect("x"), json!(5));
    assert!(runner.is_worker_running());
}

/// **VALUE**: Verifies that a worker dying mid-request surfaces as a transport error.
///
/// **WHY THIS MATTERS**: There is no reconnection; callers must learn that the handle is dead
/// rather than hang or get a fabricated value.
///
/// **BUG THIS CATCHES**: Would catch EOF on the client side being treated as an empty response.
#[test]
fn given_worker_exits_when_request_in_flight_then_transport_error() {
    // GIVEN: A runner
    let runner = spawn_runner();

    // WHEN: Asking the worker to exit while serving a call
    let err = runner.call("exit", vec![json!(3)]).expect_err("worker exits");

    // THEN: Transport error, and the handle can still be closed
    assert!(matches!(err, ProxyError::Transport { .. }), "got {err:?}");
    runner.close().expect("close after worker exit");
}

/// **VALUE**: Verifies that index access works only through `__getitem__`/`__setitem__`.
///
/// **WHY THIS MATTERS**: The proxy adds no container semantics; a target without item methods
/// must reject indexing instead of falling back to attribute reads.
#[test]
fn given_target_without_item_methods_when_indexed_then_not_found() {
    // GIVEN: A runner (no item access)
    let runner = spawn_runner();

    // WHEN / THEN: Both index operations are not found
    assert!(runner.get_item("x").expect_err("get_item").is_not_found());
    assert!(runner.set_item("x", 1).expect_err("set_item").is_not_found());
}

/// **VALUE**: Verifies attribute-backed indexing on a target that opts in.
#[test]
fn given_target_with_item_methods_when_indexed_then_reads_and_writes() {
    // GIVEN: A runner variant exposing item access
    let factory = wrap(TargetConstructor::local(|_args| {
        let target = subproxy_core::ObjectTarget::builder()
            .attribute("x", json!(5))
            .item_access()
            .build();
        Ok(Box::new(target) as Box<dyn Target>)
    }))
    .with_config(fork_only());
    let proxy = factory.spawn(vec![], Map::new()).expect("spawn");

    // WHEN: Writing then reading an item
    proxy.set_item("x", 8).expect("set_item");

    // THEN: Both item and attribute views see the write
    assert_eq!(proxy.get_item("x").expect("get_item"), json!(8));
    assert_eq!(proxy.get_attr("x").expect("x"), json!(8));
}

/// **VALUE**: Verifies that a constructor error is fatal and reported as a target error.
///
/// **WHY THIS MATTERS**: Retrying another strategy would run the same failing constructor
/// again; callers need the real cause, not "all strategies failed".
///
/// **BUG THIS CATCHES**: Would catch constructor failures being folded into fallback.
#[test]
fn given_invalid_constructor_kwargs_when_spawning_then_target_error() {
    // GIVEN: An unknown keyword for the runner
    let mut bad = Map::new();
    bad.insert("w".to_string(), json!(1));

    // WHEN: Spawning
    let err = runner_factory().spawn(vec![], bad).expect_err("should fail");

    // THEN: Target error mentioning the keyword
    assert!(matches!(err, SpawnError::Target { .. }), "got {err:?}");
    assert!(err.to_string().contains("'w'"), "got {err}");
}

/// **VALUE**: Verifies that a panicking constructor is also reported as a target error.
#[test]
fn given_panicking_constructor_when_spawning_then_target_error() {
    // GIVEN: A constructor that panics
    let factory = wrap(TargetConstructor::local(|_args| -> Result<Box<dyn Target>, TargetError> {
        panic!("constructor bug")
    }))
    .with_config(fork_only());

    // WHEN: Spawning
    let err = factory.spawn(vec![], Map::new()).expect_err("should fail");

    // THEN: Target error carrying the panic message
    assert!(matches!(err, SpawnError::Target { .. }), "got {err:?}");
    assert!(err.to_string().contains("constructor bug"), "got {err}");
}

/// **VALUE**: Verifies fallback from exec to fork for a local constructor.
///
/// **WHY THIS MATTERS**: Closures cannot be rebuilt in a fresh program; the default
/// configuration must still produce a working proxy for them.
///
/// **BUG THIS CATCHES**: Would catch `NotTransportable` stopping the strategy chain.
#[test]
fn given_local_constructor_with_default_strategies_when_spawning_then_falls_back_to_fork() {
    // GIVEN: Default strategies (exec, fork) and a local constructor
    let factory = wrap(TargetConstructor::local(build_runner)).with_config(ProxyConfig::default());

    // WHEN: Spawning
    let runner = factory.spawn(vec![], Map::new()).expect("fallback to fork");

    // THEN: Served by a forked worker
    assert_eq!(runner.info().strategy, SpawnStrategy::Fork);
    assert_eq!(runner.get_attr("x").expect("x"), json!(5));
}

/// **VALUE**: Verifies that running out of strategies yields `Exhausted` with every cause.
#[test]
fn given_local_constructor_and_exec_only_when_spawning_then_exhausted() {
    // GIVEN: Exec as the only strategy
    let config = ProxyConfig::default().with_strategies(vec![SpawnStrategy::Exec]);
    let factory = wrap(TargetConstructor::local(build_runner)).with_config(config);

    // WHEN: Spawning
    let err = factory.spawn(vec![], Map::new()).expect_err("should fail");

    // THEN: Exhausted, naming the exec failure
    assert!(matches!(err, SpawnError::Exhausted { .. }), "got {err:?}");
    assert!(err.to_string().contains("exec:"), "got {err}");
}

/// **VALUE**: Verifies that a registered target whose worker host cannot serve it falls back.
///
/// **WHY THIS MATTERS**: The test harness binary is not a worker host. Exec'ing it must fail
/// the handshake cleanly (and reap the process) so the fork strategy can take over.
///
/// **BUG THIS CATCHES**: Would catch a handshake that hangs or leaks the exec'd process.
#[test]
fn given_registered_target_and_non_worker_program_when_spawning_then_falls_back_to_fork() {
    // GIVEN: A registered constructor; the current executable is the test harness
    let factory = wrap(TargetConstructor::registered("runner", build_runner))
        .with_config(ProxyConfig::default());

    // WHEN: Spawning with exec first
    let runner = factory.spawn(vec![], Map::new()).expect("fallback to fork");

    // THEN: Fork served it
    assert_eq!(runner.info().strategy, SpawnStrategy::Fork);
    assert_eq!(runner.info().target.as_deref(), Some("runner"));
}

/// **VALUE**: Verifies that an invalid configuration is rejected before any process starts.
#[test]
fn given_empty_strategy_list_when_spawning_then_validation_error() {
    let factory = wrap(TargetConstructor::local(build_runner))
        .with_config(ProxyConfig::default().with_strategies(vec![]));

    let err = factory.spawn(vec![], Map::new()).expect_err("should fail");

    assert!(matches!(err, SpawnError::Validation { .. }), "got {err:?}");
}

/// **VALUE**: Verifies that a result over the frame limit fails one call and leaves the handle
/// usable.
///
/// **WHY THIS MATTERS**: Callers pick `max_frame_bytes`; targets pick the size of their return
/// values. One large value must not take down the worker and every later call with it.
///
/// **BUG THIS CATCHES**: Would catch the worker exiting when a response cannot be framed, or
/// the client stream being left misaligned after a rejected frame.
#[test]
fn given_result_over_frame_limit_when_called_then_failed_and_handle_keeps_working() {
    // GIVEN: A fork worker limited to 4 KiB with a method returning n bytes
    let config = fork_only().with_max_frame_bytes(4096);
    let factory = wrap(TargetConstructor::local(|_args| {
        let target = subproxy_core::ObjectTarget::builder()
            .attribute("x", json!(5))
            .method("big", |_attributes, args| {
                let length: usize = args.arg_as(0)?;
                Ok(json!("a".repeat(length)))
            })
            .build();
        Ok(Box::new(target) as Box<dyn Target>)
    }))
    .with_config(config);
    let proxy = factory.spawn(vec![], Map::new()).expect("spawn");

    // WHEN: Asking for 10000 bytes
    let err = proxy.call("big", vec![json!(10000)]).expect_err("too large");

    // THEN: A remote failure, and the same worker answers the next calls
    assert!(
        matches!(err, ProxyError::Remote { kind: RemoteErrorKind::Failed, .. }),
        "got {err:?}"
    );
    assert!(err.to_string().contains("frame limit"), "got {err}");
    assert_eq!(proxy.get_attr("x").expect("x"), json!(5));
    assert_eq!(
        proxy.call("big", vec![json!(16)]).expect("small"),
        json!("a".repeat(16))
    );
    assert!(proxy.is_worker_running());
}
