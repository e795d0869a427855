use crate::helpers::{kwargs, runner_factory, spawn_runner};

use subproxy_core::{Member, SpawnStrategy};

use std::collections::BTreeMap;

use serde_json::{Map, json};

/// **VALUE**: Verifies that constructor arguments reach the instance inside the worker.
///
/// **WHY THIS MATTERS**: The target is built exactly once, in the worker. If keyword
/// arguments were dropped on the way, every proxy would silently run with defaults.
///
/// **BUG THIS CATCHES**: Would catch kwargs not being forwarded through the fork strategy, or
/// defaults overriding explicit values.
#[test]
fn given_constructor_kwargs_when_spawned_then_worker_state_reflects_them() {
    // GIVEN: x=6, y=1, z={a:2, b:3}
    let overrides = kwargs(&[
        ("x", json!(6)),
        ("y", json!(1)),
        ("z", json!({"a": 2, "b": 3})),
    ]);

    // WHEN: Spawning a runner with them
    let runner = runner_factory()
        .spawn(vec![], overrides)
        .expect("runner should spawn");

    // THEN: All three attributes read back as given
    assert_eq!(runner.get_attr("x").expect("x"), json!(6));
    assert_eq!(runner.get_attr("y").expect("y"), json!(1));
    assert_eq!(runner.get_attr("z").expect("z"), json!({"a": 2, "b": 3}));
    assert_eq!(runner.info().strategy, SpawnStrategy::Fork);
}

/// **VALUE**: Verifies that every member of a fresh target is reported by `has_member`.
///
/// **WHY THIS MATTERS**: Callers use the capability set to decide what they can do with a
/// proxy; a missing entry makes a real method look absent.
#[test]
fn given_fresh_runner_when_checking_members_then_all_are_present() {
    // GIVEN: A runner
    let runner = spawn_runner();

    // THEN: Every declared member is present, nothing else
    for name in ["x", "y", "z", "get_y", "set_y", "explode", "panic", "exit"] {
        assert!(runner.has_member(name), "missing member {name}");
    }
    assert!(!runner.has_member("w"));
    assert!(runner.capabilities().is_callable("get_y"));
    assert!(!runner.capabilities().is_callable("x"));
}

/// **VALUE**: Verifies that an attribute write is visible to a method of the same instance.
///
/// **WHY THIS MATTERS**: This is the core promise: one persistent instance per handle, so a
/// `set` followed by a method call observes the write.
///
/// **BUG THIS CATCHES**: Would catch sets applied to a copy, or not applied before the ack.
#[test]
fn given_set_attribute_when_calling_getter_then_new_value_returned() {
    // GIVEN: A runner
    let runner = spawn_runner();

    // WHEN: Setting y to 15
    runner.set("y", 15).expect("set y");

    // THEN: get_y sees it
    assert_eq!(runner.call("get_y", vec![]).expect("get_y"), json!(15));
    assert_eq!(runner.get_attr_as::<i64>("y").expect("typed y"), 15);
}

/// **VALUE**: Verifies that `get` hands out bound methods for methods and values otherwise.
///
/// **WHY THIS MATTERS**: Call routing depends solely on the announced capability set;
/// attributes must not be invoked and methods must not be read.
#[test]
fn given_member_names_when_getting_then_methods_are_bound_and_attributes_are_values() {
    // GIVEN: A runner
    let runner = spawn_runner();

    // WHEN: Resolving a method and an attribute
    let method = runner.get("set_y").expect("set_y");
    let value = runner.get("x").expect("x");

    // THEN: A bound method that works, and a plain value
    let Member::Method(set_y) = method else {
        panic!("set_y should resolve to a method");
    };
    assert_eq!(set_y.selector(), "set_y");
    set_y.call(vec![json!(21)]).expect("call bound method");
    assert_eq!(runner.get_attr("y").expect("y"), json!(21));

    assert!(!value.is_callable());
    assert_eq!(value.into_value(), Some(json!(5)));
}

/// **VALUE**: Verifies there is no aliasing between a returned value and worker state.
///
/// **WHY THIS MATTERS**: Values cross the boundary by copy. Code that mutates what it read
/// must not expect the worker to change, and must not be able to corrupt it.
///
/// **BUG THIS CATCHES**: Would catch any caching of values on the client side.
#[test]
fn given_returned_value_when_mutated_locally_then_worker_state_unchanged() {
    // GIVEN: A runner and a local copy of z
    let runner = spawn_runner();
    let mut z: BTreeMap<String, i64> = runner.get_attr_as("z").expect("z");

    // WHEN: Mutating the copy
    z.insert("a".to_string(), 100);
    z.insert("c".to_string(), 7);

    // THEN: The worker still has the original
    assert_eq!(runner.get_attr("z").expect("z"), json!({"a": 1, "b": 2}));
}

/// **VALUE**: Verifies that a missing member is reported as `NotFound` for every access path.
///
/// **WHY THIS MATTERS**: `NotFound` is the local equivalent of a missing attribute; callers
/// branch on it.
#[test]
fn given_missing_member_when_accessed_then_not_found() {
    // GIVEN: A runner
    let runner = spawn_runner();

    // WHEN / THEN: get, call and set of an unknown name
    assert!(runner.get("w").expect_err("get").is_not_found());
    assert!(runner.get_attr("w").expect_err("get_attr").is_not_found());
    assert!(runner.call("w", vec![]).expect_err("call").is_not_found());
    assert!(runner.set("w", 1).expect_err("set").is_not_found());
    assert!(runner.get_attr("not a name").expect_err("invalid").is_not_found());
}

/// **VALUE**: Verifies that typed helpers report mismatched types as decode errors.
#[test]
fn given_wrong_type_when_reading_typed_then_decode_error() {
    // GIVEN: A runner whose z is a map
    let runner = spawn_runner();

    // WHEN: Reading z as a number
    let err = runner.get_attr_as::<i64>("z").expect_err("should fail");

    // THEN: Decode error naming the selector
    assert!(err.to_string().contains("Decode Error: 'z'"), "got {err}");
}

/// **VALUE**: Verifies keyword arguments on calls.
#[test]
fn given_keyword_arguments_when_calling_then_forwarded() {
    // GIVEN: An echo worker
    let echo = crate::helpers::echo_factory()
        .spawn(vec![], Map::new())
        .expect("echo should spawn");

    // WHEN: Calling with keywords only
    let result = echo
        .call_with(
            "echo",
            vec![],
            kwargs(&[("message", json!("hi")), ("wait", json!(0.0))]),
        )
        .expect("echo");

    // THEN: Message echoed
    assert_eq!(result, json!("hi"));
    assert_eq!(echo.call_as::<String>("echo", vec![json!("typed")]).expect("typed"), "typed");
}
