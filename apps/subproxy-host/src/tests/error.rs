// Unit tests for error module
// Tests error serialization and conversion from core errors

use crate::error::HostError;

use subproxy_core::error::proxy::ProxyError;

use common::ErrorLocation;

use std::panic::Location;

/// **VALUE**: Tests that errors can be serialized for the demo report.
///
/// **BUG THIS CATCHES**: Would catch if someone removes the `#[derive(Serialize)]`
/// or adds a non-serializable field.
#[test]
fn given_host_error_when_serialized_then_contains_variant_and_message() {
    // GIVEN: A HostError
    let err = HostError::Host {
        message: String::from("Test"),
        location: ErrorLocation::from(Location::caller()),
    };

    // WHEN: Serializing to JSON
    let json = serde_json::to_string(&err).expect("serializable");

    // THEN: Variant tag and message are present
    assert!(json.contains("\"type\":\"Host\""), "got {json}");
    assert!(json.contains("Test"));
}

/// **VALUE**: Verifies that core errors keep their message when converted.
///
/// **WHY THIS MATTERS**: The demo reports core failures through `HostError`; losing the
/// message would hide which member or spawn step failed.
///
/// **BUG THIS CATCHES**: Would catch a conversion that drops the source text.
#[test]
fn given_proxy_error_when_converted_then_core_variant_keeps_message() {
    // GIVEN: A not-found proxy error
    let proxy_error = ProxyError::NotFound {
        selector: "w".to_string(),
        location: ErrorLocation::from(Location::caller()),
    };

    // WHEN: Converting
    let err = HostError::from(proxy_error);

    // THEN: Core variant with the original text
    assert!(matches!(err, HostError::Core { .. }));
    let text = err.to_string();
    assert!(text.starts_with("Core Error: Member Not Found Error: 'w'"), "got {text}");
}
