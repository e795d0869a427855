use subproxy_core::error::target::TargetError;
use subproxy_core::{CallArgs, ObjectTarget, Target, Value};

use serde_json::{Map, json};

const DEFAULT_X: i64 = 5;
const DEFAULT_Y: i64 = 4;

/// A plain attribute holder: `x`, `y`, `z`, `get_y`/`set_y`, `snapshot` (all attributes as
/// one object), and item access over the same attributes. Keyword arguments override the
/// defaults.
pub fn build(args: CallArgs) -> Result<Box<dyn Target>, TargetError> {
    let target = ObjectTarget::builder()
        .attribute("x", json!(DEFAULT_X))
        .attribute("y", json!(DEFAULT_Y))
        .attribute("z", json!({"a": 1, "b": 2}))
        .attributes_from(&args.keyword)?
        .method("get_y", |attributes, _args| {
            Ok(attributes.get("y").cloned().unwrap_or(Value::Null))
        })
        .method("set_y", |attributes, args| {
            let value = args
                .param(0, "value")
                .cloned()
                .ok_or_else(|| TargetError::invalid_arguments("set_y", "missing value"))?;
            attributes.insert("y", value);
            Ok(Value::Null)
        })
        .method("snapshot", |attributes, _args| {
            let fields: Map<String, Value> = attributes
                .names()
                .into_iter()
                .filter_map(|name| attributes.get(&name).cloned().map(|value| (name, value)))
                .collect();
            Ok(Value::Object(fields))
        })
        .item_access()
        .build();

    Ok(Box::new(target))
}
