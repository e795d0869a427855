use crate::helpers::{echo_factory, kwargs, runner_factory};

use std::sync::Arc;
use std::thread;

use rand::Rng;
use serde_json::{Map, json};

const THREADS: usize = 8;
const TOTAL_CALLS: usize = 1000;
const MAX_WAIT_SECONDS: f64 = 0.002;

/// **VALUE**: Verifies that concurrent callers on one handle each receive their own response.
///
/// **WHY THIS MATTERS**: The handle is shared across threads and the worker answers strictly
/// in order. Without the round-trip lock, one thread could read the response meant for
/// another and return someone else's value.
///
/// **BUG THIS CATCHES**: Would catch the lock being released between send and receive, or
/// request ids not being checked.
#[test]
fn given_shared_handle_when_many_threads_call_then_each_gets_its_own_value() {
    // GIVEN: One echo worker shared by 8 threads
    let echo = Arc::new(
        echo_factory()
            .spawn(vec![], Map::new())
            .expect("echo should spawn"),
    );

    // WHEN: 1000 calls, each echoing a distinct random float after a random delay
    let workers: Vec<_> = (0..THREADS)
        .map(|thread_index| {
            let echo = Arc::clone(&echo);
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                let mut mismatches = Vec::new();
                for call_index in (thread_index..TOTAL_CALLS).step_by(THREADS) {
                    let payload = call_index as f64 + rng.gen_range(0.0..1.0);
                    let wait = rng.gen_range(0.0..MAX_WAIT_SECONDS);
                    let echoed = echo
                        .call("echo", vec![json!(payload), json!(wait)])
                        .expect("echo call");
                    if echoed != json!(payload) {
                        mismatches.push((payload, echoed));
                    }
                }
                mismatches
            })
        })
        .collect();

    // THEN: No caller ever saw another caller's value
    let mismatches: Vec<_> = workers
        .into_iter()
        .flat_map(|worker| worker.join().expect("thread panicked"))
        .collect();
    assert!(mismatches.is_empty(), "mismatched responses: {mismatches:?}");
}

/// **VALUE**: Verifies that workers forked from several parent threads at once all start.
///
/// **WHY THIS MATTERS**: Forking copies only the calling thread. A child that touched a lock
/// held by another parent thread (a log sink, for example) would hang before its handshake,
/// and `spawn` would block forever.
///
/// **BUG THIS CATCHES**: Would catch a forked child that logs or exits through the parent's
/// exit hooks, or fork-time descriptor leaks between sibling workers.
#[test]
fn given_many_threads_when_forking_workers_concurrently_then_each_sees_its_own_arguments() {
    // GIVEN: 8 threads, each building a runner with a distinct x
    let spawners: Vec<_> = (0..THREADS as i64)
        .map(|index| {
            thread::spawn(move || {
                let runner = runner_factory()
                    .spawn(vec![], kwargs(&[("x", json!(index))]))
                    .expect("runner should spawn");
                let x = runner.get_attr("x").expect("x");
                runner.close().expect("close");
                (index, x)
            })
        })
        .collect();

    // WHEN: Collecting every result
    let results: Vec<_> = spawners
        .into_iter()
        .map(|spawner| spawner.join().expect("thread panicked"))
        .collect();

    // THEN: Each thread saw the value it constructed with
    assert_eq!(results.len(), THREADS);
    for (index, x) in &results {
        assert_eq!(*x, json!(index));
    }
}
