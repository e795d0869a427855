use crate::channel::{Channel, DEFAULT_MAX_FRAME_BYTES};
use crate::error::channel::ChannelError;
use crate::protocol::{Request, Response, Value};

use std::io::Cursor;

use serde_json::json;

fn channel_over(input: &[u8]) -> Channel {
    Channel::new(Box::new(Cursor::new(input.to_vec())), Box::new(Vec::new()))
}

/// **VALUE**: Verifies that a request sent on one endpoint arrives intact on the other.
///
/// **WHY THIS MATTERS**: Every proxy operation is exactly one framed request and one framed
/// response. If framing drops or reorders bytes, every call returns garbage.
///
/// **BUG THIS CATCHES**: Would catch a Content-Length computed over the wrong buffer, a
/// missing flush after the payload, or a header that the reader does not accept.
#[test]
fn given_socket_pair_when_request_sent_then_peer_receives_identical_request() {
    // GIVEN: Two connected endpoints
    let (mut client, mut worker) = Channel::pair().expect("socket pair");
    let request = Request::call(7, "echo", vec![json!("hello"), json!(0.25)], Default::default());

    // WHEN: Sending the request and a response back
    client.send(&request).expect("send request");
    let received: Request = worker.recv().expect("receive request");
    worker
        .send(&Response::value(7, json!("hello")))
        .expect("send response");
    let response: Response = client.recv().expect("receive response");

    // THEN: Both messages survive the trip unchanged
    assert_eq!(received, request);
    assert_eq!(response, Response::value(7, json!("hello")));
}

/// **VALUE**: Verifies that several frames written back to back are read one at a time, in
/// order.
///
/// **WHY THIS MATTERS**: The buffered reader may pull more than one frame off the socket at
/// once; the second frame must not be lost in the buffer.
///
/// **BUG THIS CATCHES**: Would catch a reader that discards buffered bytes between frames.
#[test]
fn given_multiple_frames_when_received_then_delivered_in_order() {
    // GIVEN: Three frames in flight
    let (mut left, mut right) = Channel::pair().expect("socket pair");
    for id in 1..=3u64 {
        left.send(&Response::ack(id)).expect("send");
    }

    // WHEN: Receiving three times
    let ids: Vec<u64> = (0..3)
        .map(|_| right.recv::<Response>().expect("recv").request_id)
        .collect();

    // THEN: Order is preserved
    assert_eq!(ids, vec![1, 2, 3]);
}

/// **VALUE**: Verifies that EOF before a header is reported as `Closed`.
///
/// **WHY THIS MATTERS**: The dispatch loop treats `Closed` as a clean shutdown request. If
/// EOF surfaced as an IO or frame error, every worker would log a failure on normal exit.
///
/// **BUG THIS CATCHES**: Would catch `read_line` returning 0 being treated as an empty header.
#[test]
fn given_peer_dropped_when_receiving_then_returns_closed() {
    // GIVEN: A pair whose other end is dropped
    let (left, mut right) = Channel::pair().expect("socket pair");
    drop(left);

    // WHEN: Receiving
    let result = right.recv::<Value>();

    // THEN: The channel reports a clean close
    let err = result.expect_err("should fail");
    assert!(matches!(err, ChannelError::Closed { .. }), "got {err:?}");
    assert!(err.is_closed());
}

/// **VALUE**: Verifies that a frame truncated mid-payload is also a close, not a decode error.
///
/// **WHY THIS MATTERS**: A worker killed while writing leaves a partial frame behind. The
/// client must report the lost connection, not blame the payload format.
///
/// **BUG THIS CATCHES**: Would catch `UnexpectedEof` from `read_exact` leaking out as IO.
#[test]
fn given_truncated_payload_when_receiving_then_returns_closed() {
    // GIVEN: A header announcing more bytes than follow
    let mut channel = channel_over(b"Content-Length: 20\r\n\r\n{\"a\":");

    // WHEN: Receiving
    let err = channel.recv::<Value>().expect_err("should fail");

    // THEN: Closed
    assert!(matches!(err, ChannelError::Closed { .. }), "got {err:?}");
}

/// **VALUE**: Verifies that a frame without a Content-Length header is rejected.
///
/// **WHY THIS MATTERS**: An exec'd worker whose target prints to stdout corrupts the stream.
/// The parent must fail the handshake instead of guessing a length.
///
/// **BUG THIS CATCHES**: Would catch a parser that skips unknown lines or accepts any header.
#[test]
fn given_missing_header_when_receiving_then_returns_frame_error() {
    // GIVEN: Stray output where a header should be
    let mut channel = channel_over(b"hello from the target\r\n\r\n{}");

    // WHEN: Receiving
    let err = channel.recv::<Value>().expect_err("should fail");

    // THEN: Frame error naming the bad header
    assert!(matches!(err, ChannelError::Frame { .. }), "got {err:?}");
    assert!(err.to_string().contains("Content-Length"));
}

/// **VALUE**: Verifies that frames above the configured limit are refused before allocation.
///
/// **WHY THIS MATTERS**: The length comes from the peer; without a limit a corrupted header
/// could make the reader allocate gigabytes.
///
/// **BUG THIS CATCHES**: Would catch the limit being checked after `vec![0; len]`, or not at
/// all.
#[test]
fn given_oversized_frame_when_receiving_then_returns_oversized_error() {
    // GIVEN: A channel limited to 16 bytes and a complete 64 byte frame
    let mut input = b"Content-Length: 64\r\n\r\n".to_vec();
    input.extend_from_slice(&[b' '; 64]);
    let mut channel = channel_over(&input).with_max_frame_bytes(16);

    // WHEN: Receiving
    let err = channel.recv::<Value>().expect_err("should fail");

    // THEN: Rejected, and only this message counts as lost
    assert!(matches!(err, ChannelError::Oversized { .. }), "got {err:?}");
    assert!(err.to_string().contains("exceeds limit"));
    assert!(err.is_message_rejected());
    assert!(!err.is_closed());
}

/// **VALUE**: Verifies that the frame after a rejected oversized frame is still readable.
///
/// **WHY THIS MATTERS**: A handle whose limit is smaller than one response must keep working
/// for the next call. Leaving the oversized payload in the buffer would make every later
/// read parse JSON bytes as a header.
///
/// **BUG THIS CATCHES**: Would catch the reader returning at the limit check without
/// consuming the blank line and the payload.
#[test]
fn given_oversized_frame_followed_by_small_one_when_receiving_then_stream_stays_aligned() {
    // GIVEN: A sender without a limit and a receiver limited to 64 bytes
    let (mut sender, receiver) = Channel::pair().expect("socket pair");
    let mut receiver = receiver.with_max_frame_bytes(64);
    sender
        .send(&Response::value(1, json!("x".repeat(1000))))
        .expect("send large");
    sender.send(&Response::ack(2)).expect("send small");

    // WHEN: Receiving twice
    let first = receiver.recv::<Response>();
    let second = receiver.recv::<Response>();

    // THEN: The large frame is rejected, the small one arrives intact
    let err = first.expect_err("oversized");
    assert!(matches!(err, ChannelError::Oversized { .. }), "got {err:?}");
    assert_eq!(second.expect("aligned"), Response::ack(2));
}

/// **VALUE**: Verifies that a peer closing inside a skipped frame is still a close.
#[test]
fn given_truncated_oversized_frame_when_receiving_then_returns_closed() {
    // GIVEN: An oversized header with only part of its payload
    let mut channel =
        channel_over(b"Content-Length: 1024\r\n\r\n{\"a\":").with_max_frame_bytes(16);

    // WHEN: Receiving
    let err = channel.recv::<Value>().expect_err("should fail");

    // THEN: Closed
    assert!(err.is_closed(), "got {err:?}");
}

/// **VALUE**: Verifies that outgoing frames are bounded by the same limit.
///
/// **BUG THIS CATCHES**: Would catch a sender that produces frames its own peer must reject.
#[test]
fn given_small_limit_when_sending_large_message_then_returns_oversized_error() {
    // GIVEN: A 4 byte limit
    let mut channel = channel_over(b"").with_max_frame_bytes(4);

    // WHEN: Sending a longer payload
    let err = channel
        .send(&json!("definitely longer than four bytes"))
        .expect_err("should fail");

    // THEN: Rejected before anything was written
    assert!(matches!(err, ChannelError::Oversized { .. }), "got {err:?}");
    assert!(err.is_message_rejected());
}

/// **VALUE**: Verifies that a payload that is not valid JSON for the expected type is a
/// decode error.
///
/// **BUG THIS CATCHES**: Would catch decode failures being mislabeled as frame or IO errors.
#[test]
fn given_malformed_payload_when_receiving_then_returns_decode_error() {
    // GIVEN: A well-framed payload that is not a Request
    let mut channel = channel_over(b"Content-Length: 2\r\n\r\n[]");

    // WHEN: Receiving a Request
    let err = channel.recv::<Request>().expect_err("should fail");

    // THEN: Decode error
    assert!(matches!(err, ChannelError::Decode { .. }), "got {err:?}");
}

#[test]
fn given_new_channel_when_created_then_uses_default_frame_limit() {
    let channel = channel_over(b"");

    assert_eq!(channel.max_frame_bytes(), DEFAULT_MAX_FRAME_BYTES);
}
