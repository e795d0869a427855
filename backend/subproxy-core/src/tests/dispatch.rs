use crate::channel::Channel;
use crate::error::target::TargetError;
use crate::protocol::{
    Handshake, Kwargs, Operation, Outcome, RemoteErrorKind, Request, Response, Value,
};
use crate::target::object::ObjectTarget;
use crate::worker::DispatchLoop;

use std::io::Cursor;
use std::thread;

use serde_json::json;

fn sample_target() -> ObjectTarget {
    ObjectTarget::builder()
        .attribute("x", json!(5))
        .attribute("y", json!(4))
        .method("get_y", |attributes, _args| {
            Ok(attributes.get("y").cloned().unwrap_or(Value::Null))
        })
        .method("explode", |_attributes, args| {
            Err(TargetError::failed(&args.selector, "exploded on purpose"))
        })
        .method("panic", |_attributes, _args| panic!("target bug"))
        .build()
}

fn detached_loop(target: ObjectTarget) -> DispatchLoop {
    let channel = Channel::new(Box::new(Cursor::new(Vec::new())), Box::new(Vec::new()));
    DispatchLoop::new(Box::new(target), channel)
}

fn remote_kind(response: &Response) -> Option<RemoteErrorKind> {
    match &response.outcome {
        Outcome::Error(error) => Some(error.kind),
        _ => None,
    }
}

/// **VALUE**: Verifies that a call is answered with the method's return value and echoes the
/// request id.
///
/// **WHY THIS MATTERS**: The client matches responses to requests by id; a lost id makes
/// every call a protocol error.
///
/// **BUG THIS CATCHES**: Would catch `dispatch` answering with a fixed or incremented id.
#[test]
fn given_call_request_when_dispatched_then_returns_method_value_with_same_id() {
    // GIVEN: A loop over the sample target
    let mut dispatch = detached_loop(sample_target());

    // WHEN: Calling get_y
    let response = dispatch.dispatch(Request::call(41, "get_y", vec![], Kwargs::new()));

    // THEN: y comes back under request 41
    assert_eq!(response, Response::value(41, json!(4)));
}

/// **VALUE**: Verifies that a set is acknowledged and visible to the next get.
///
/// **WHY THIS MATTERS**: Sets used to be fire-and-forget; now the caller blocks on the `Ack`,
/// so the worker must send exactly one.
///
/// **BUG THIS CATCHES**: Would catch set answering with a value, or not applying the change.
#[test]
fn given_set_request_when_dispatched_then_acknowledged_and_applied() {
    // GIVEN: A loop over the sample target
    let mut dispatch = detached_loop(sample_target());

    // WHEN: Setting y then reading it
    let ack = dispatch.dispatch(Request::set(1, "y", json!(15)));
    let read = dispatch.dispatch(Request::get(2, "y"));

    // THEN: Ack, then the new value
    assert_eq!(ack, Response::ack(1));
    assert_eq!(read, Response::value(2, json!(15)));
}

/// **VALUE**: Verifies that a set without exactly one value is rejected as invalid arguments.
///
/// **BUG THIS CATCHES**: Would catch an index panic on `args[0]` for an empty set.
#[test]
fn given_set_without_value_when_dispatched_then_invalid_arguments() {
    // GIVEN: A malformed set
    let mut dispatch = detached_loop(sample_target());
    let request = Request {
        request_id: 5,
        op: Operation::Set,
        selector: "y".to_string(),
        args: vec![],
        kwargs: Kwargs::new(),
    };

    // WHEN: Dispatching
    let response = dispatch.dispatch(request);

    // THEN: InvalidArguments
    assert_eq!(remote_kind(&response), Some(RemoteErrorKind::InvalidArguments));
}

/// **VALUE**: Verifies that unknown members produce a `NotFound` tag for every operation.
///
/// **WHY THIS MATTERS**: The client turns `NotFound` into `ProxyError::NotFound`; other tags
/// would hide typos behind generic failures.
#[test]
fn given_unknown_selector_when_dispatched_then_not_found() {
    // GIVEN: A loop over the sample target
    let mut dispatch = detached_loop(sample_target());

    // WHEN: Calling, reading and writing a missing member
    let call = dispatch.dispatch(Request::call(1, "missing", vec![], Kwargs::new()));
    let get = dispatch.dispatch(Request::get(2, "missing"));
    let set = dispatch.dispatch(Request::set(3, "missing", json!(1)));

    // THEN: All NotFound
    for response in [call, get, set] {
        assert_eq!(remote_kind(&response), Some(RemoteErrorKind::NotFound));
    }
}

/// **VALUE**: Verifies that index operations without `__getitem__`/`__setitem__` are not found.
///
/// **WHY THIS MATTERS**: The proxy adds no container behaviour of its own; a target without
/// item access must not silently grow one.
///
/// **BUG THIS CATCHES**: Would catch index access falling back to attribute reads.
#[test]
fn given_target_without_item_access_when_indexed_then_not_found() {
    // GIVEN: A target without item access
    let mut dispatch = detached_loop(sample_target());

    // WHEN: Index get and set
    let get = dispatch.dispatch(Request::index_get(1, json!("x")));
    let set = dispatch.dispatch(Request::index_set(2, json!("x"), json!(1)));

    // THEN: Both NotFound
    assert_eq!(remote_kind(&get), Some(RemoteErrorKind::NotFound));
    assert_eq!(remote_kind(&set), Some(RemoteErrorKind::NotFound));
}

/// **VALUE**: Verifies that index operations route to the well-known selectors when present.
///
/// **BUG THIS CATCHES**: Would catch an index set answered with a value instead of an ack.
#[test]
fn given_target_with_item_access_when_indexed_then_routed_to_item_methods() {
    // GIVEN: A target exposing item access
    let target = ObjectTarget::builder()
        .attribute("x", json!(5))
        .item_access()
        .build();
    let mut dispatch = detached_loop(target);

    // WHEN: Writing and reading an item
    let set = dispatch.dispatch(Request::index_set(1, json!("x"), json!(9)));
    let get = dispatch.dispatch(Request::index_get(2, json!("x")));

    // THEN: Ack, then the new item
    assert_eq!(set, Response::ack(1));
    assert_eq!(get, Response::value(2, json!(9)));
}

/// **VALUE**: Verifies that target errors and panics become tagged responses and the loop
/// keeps serving.
///
/// **WHY THIS MATTERS**: A target bug must cost one call, not the whole worker. Without the
/// per-request capture, one panic would kill the worker and every later call would hang or
/// fail with a transport error.
///
/// **BUG THIS CATCHES**: Would catch a missing `catch_unwind` or errors that end the loop.
#[test]
fn given_failing_and_panicking_methods_when_dispatched_then_loop_keeps_serving() {
    // GIVEN: A loop over the sample target
    let mut dispatch = detached_loop(sample_target());

    // WHEN: Calling a failing method, a panicking one, then a healthy one
    let failed = dispatch.dispatch(Request::call(1, "explode", vec![], Kwargs::new()));
    let panicked = dispatch.dispatch(Request::call(2, "panic", vec![], Kwargs::new()));
    let healthy = dispatch.dispatch(Request::get(3, "x"));

    // THEN: Tagged errors, then a normal answer
    assert_eq!(remote_kind(&failed), Some(RemoteErrorKind::Failed));
    assert_eq!(remote_kind(&panicked), Some(RemoteErrorKind::Panicked));
    match &panicked.outcome {
        Outcome::Error(error) => assert!(error.message.contains("target bug")),
        other => panic!("expected error, got {other:?}"),
    }
    assert_eq!(healthy, Response::value(3, json!(5)));
}

/// **VALUE**: Verifies the capability snapshot taken at construction.
#[test]
fn given_sample_target_when_loop_created_then_capabilities_list_members() {
    // GIVEN / WHEN: A new loop
    let dispatch = detached_loop(sample_target());
    let capabilities = dispatch.capabilities();

    // THEN: Methods and attributes are split
    assert_eq!(capabilities.methods(), ["explode", "get_y", "panic"].map(String::from));
    assert_eq!(capabilities.attributes(), ["x", "y"].map(String::from));
}

/// **VALUE**: Verifies the full loop over a socket pair: announce once, serve, stop on EOF.
///
/// **WHY THIS MATTERS**: This is the worker's whole life; EOF must end it with `Ok` so the
/// process exits cleanly when its handle goes away.
///
/// **BUG THIS CATCHES**: Would catch a loop that errors on EOF, forgets the announcement, or
/// miscounts served requests.
#[test]
fn given_running_loop_when_client_disconnects_then_loop_ends_cleanly() {
    // GIVEN: A loop running on its own thread
    let (mut client, worker) = Channel::pair().expect("socket pair");
    let server = thread::spawn(move || {
        let mut dispatch = DispatchLoop::new(Box::new(sample_target()), worker);
        dispatch.announce("token-1").expect("announce");
        dispatch.run()
    });

    // WHEN: Reading the announcement, making two requests and hanging up
    let handshake: Handshake = client.recv().expect("handshake");
    client.send(&Request::get(1, "x")).expect("send");
    let first: Response = client.recv().expect("recv");
    client
        .send(&Request::call(2, "get_y", vec![], Kwargs::new()))
        .expect("send");
    let second: Response = client.recv().expect("recv");
    drop(client);

    // THEN: The announcement carries the token, answers match, loop ends with Ok(2)
    match handshake {
        Handshake::Ready(announcement) => {
            assert_eq!(announcement.token, "token-1");
            assert_eq!(announcement.pid, std::process::id());
            assert!(announcement.capabilities.is_callable("get_y"));
        }
        other => panic!("expected ready handshake, got {other:?}"),
    }
    assert_eq!(first, Response::value(1, json!(5)));
    assert_eq!(second, Response::value(2, json!(4)));
    let served = server.join().expect("join").expect("loop result");
    assert_eq!(served, 2);
}

/// **VALUE**: Verifies that a result too large for the frame limit costs one call, not the
/// worker.
///
/// **WHY THIS MATTERS**: The size of a return value is chosen by the target, not by the
/// transport. Ending the loop on it would kill the worker and every later call on the handle.
///
/// **BUG THIS CATCHES**: Would catch the send error of a single response being propagated out
/// of the loop like a broken pipe.
#[test]
fn given_result_over_frame_limit_when_served_then_failed_response_and_loop_continues() {
    // GIVEN: A worker endpoint limited to 256 bytes and a method returning a long string
    let (mut client, worker) = Channel::pair().expect("socket pair");
    let worker = worker.with_max_frame_bytes(256);
    let server = thread::spawn(move || {
        let target = ObjectTarget::builder()
            .attribute("x", json!(5))
            .method("big", |_attributes, args| {
                let length: usize = args.arg_as(0)?;
                Ok(json!("a".repeat(length)))
            })
            .build();
        DispatchLoop::new(Box::new(target), worker).run()
    });

    // WHEN: Asking for 1000 bytes, then reading an attribute
    client
        .send(&Request::call(1, "big", vec![json!(1000)], Kwargs::new()))
        .expect("send");
    let oversized: Response = client.recv().expect("recv");
    client.send(&Request::get(2, "x")).expect("send");
    let next: Response = client.recv().expect("recv");
    drop(client);

    // THEN: A tagged failure naming the limit, then a normal answer, then a clean stop
    assert_eq!(oversized.request_id, 1);
    assert_eq!(remote_kind(&oversized), Some(RemoteErrorKind::Failed));
    match &oversized.outcome {
        Outcome::Error(error) => {
            assert_eq!(error.selector, "big");
            assert!(error.message.contains("frame limit"), "got {}", error.message);
        }
        other => panic!("expected error outcome, got {other:?}"),
    }
    assert_eq!(next, Response::value(2, json!(5)));
    assert_eq!(server.join().expect("join").expect("loop result"), 2);
}
