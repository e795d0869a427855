use crate::helpers::{echo_factory, runner_factory};

use subproxy_core::AsyncProxy;

use serde_json::{Map, json};

/// **VALUE**: Verifies the tokio facade end to end: spawn, call, set, read.
///
/// **WHY THIS MATTERS**: Async hosts must not block their executor on a round trip; the
/// facade moves each one to the blocking pool but must keep the same semantics.
///
/// **BUG THIS CATCHES**: Would catch the facade bypassing the handle's lock or losing errors
/// from the blocking task.
#[tokio::test]
async fn given_async_proxy_when_used_then_behaves_like_blocking_handle() {
    // GIVEN: An async runner
    let runner = AsyncProxy::spawn(runner_factory(), vec![], Map::new())
        .await
        .expect("spawn");

    // WHEN: Writing through set and reading through a method
    runner.set("y", json!(15)).await.expect("set");
    let y = runner.call("get_y", vec![]).await.expect("get_y");

    // THEN: Same results as the blocking API
    assert_eq!(y, json!(15));
    assert_eq!(runner.get_attr_as::<i64>("x").await.expect("x"), 5);
    assert!(runner.has_member("set_y"));
    assert!(runner.get_attr("w").await.expect_err("w").is_not_found());
}

/// **VALUE**: Verifies that clones of an async proxy share one worker and run concurrently.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_cloned_async_proxy_when_called_concurrently_then_all_answers_match() {
    // GIVEN: An async echo worker and 16 clones
    let echo = AsyncProxy::spawn(echo_factory(), vec![], Map::new())
        .await
        .expect("spawn");

    // WHEN: Calling from concurrent tasks
    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let echo = echo.clone();
            tokio::spawn(async move { (i, echo.call("echo", vec![json!(i)]).await) })
        })
        .collect();

    // THEN: Each task gets its own value, all from the same worker
    for task in tasks {
        let (i, result) = task.await.expect("task");
        assert_eq!(result.expect("echo"), json!(i));
    }
    assert!(echo.handle().is_worker_running());
}
