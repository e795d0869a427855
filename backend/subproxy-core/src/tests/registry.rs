use crate::error::target::TargetError;
use crate::target::object::ObjectTarget;
use crate::target::registry::{TargetConstructor, TargetRegistry};
use crate::target::{CallArgs, Target};

use serde_json::json;

fn build_point(args: CallArgs) -> Result<Box<dyn Target>, TargetError> {
    let target = ObjectTarget::builder()
        .attribute("x", json!(0))
        .attributes_from(&args.keyword)?
        .build();
    Ok(Box::new(target))
}

/// **VALUE**: Verifies that registering returns a transportable constructor that the registry
/// resolves by the same name.
///
/// **WHY THIS MATTERS**: The exec strategy sends only the name; the worker host must find the
/// same constructor under it.
///
/// **BUG THIS CATCHES**: Would catch `register` returning a local constructor or storing it
/// under another key.
#[test]
fn given_registered_target_when_looked_up_then_same_name_and_transportable() {
    // GIVEN: A registry with one target
    let mut registry = TargetRegistry::new();
    let constructor = registry.register("point", build_point);

    // WHEN: Looking it up
    let resolved = registry.get("point").expect("registered");

    // THEN: Transportable, same name, listed
    assert!(constructor.is_transportable());
    assert_eq!(resolved.name(), Some("point"));
    assert_eq!(registry.names(), vec!["point".to_string()]);
    assert!(registry.get("line").is_none());
}

/// **VALUE**: Verifies that local constructors are not transportable and are not registered.
#[test]
fn given_local_constructor_when_inserted_then_ignored() {
    // GIVEN: A local closure constructor
    let local = TargetConstructor::local(build_point);
    let mut registry = TargetRegistry::new();

    // WHEN: Inserting it
    registry.insert(local.clone());

    // THEN: Not transportable, registry still empty
    assert!(!local.is_transportable());
    assert!(local.name().is_none());
    assert!(registry.names().is_empty());
}

/// **VALUE**: Verifies that constructor arguments reach the target and errors come back.
#[test]
fn given_constructor_when_invoked_then_arguments_applied_or_rejected() {
    // GIVEN: The point constructor
    let constructor = TargetConstructor::registered("point", build_point);
    let mut kwargs = serde_json::Map::new();
    kwargs.insert("x".to_string(), json!(3));

    // WHEN: Constructing with a known and an unknown keyword
    let target = constructor
        .construct(CallArgs::new("point", vec![], kwargs))
        .expect("construct");
    let mut bad = serde_json::Map::new();
    bad.insert("q".to_string(), json!(1));
    let err = constructor
        .construct(CallArgs::new("point", vec![], bad))
        .err()
        .expect("should fail");

    // THEN: x applied, unknown keyword rejected
    assert_eq!(target.get("x").expect("get"), json!(3));
    assert!(matches!(err, TargetError::InvalidArguments { .. }));
}
