//! Test targets and factories shared by the integration tests.
//!
//! Everything here uses local constructors and the fork strategy: the test harness binary
//! cannot act as a worker host, so exec is covered by the host application's own tests.

use subproxy_core::error::target::TargetError;
use subproxy_core::{
    CallArgs, ObjectTarget, ProxyConfig, ProxyFactory, ProxyHandle, SpawnStrategy, Target,
    TargetConstructor, wrap,
};

use std::thread::sleep;
use std::time::Duration;

use serde_json::{Map, Value, json};

pub fn fork_only() -> ProxyConfig {
    ProxyConfig::default().with_strategies(vec![SpawnStrategy::Fork])
}

/// Attribute target with `x`, `y`, `z`, accessors for `y` and a few failure modes.
pub fn build_runner(args: CallArgs) -> Result<Box<dyn Target>, TargetError> {
    let target = ObjectTarget::builder()
        .attribute("x", json!(5))
        .attribute("y", json!(4))
        .attribute("z", json!({"a": 1, "b": 2}))
        .attributes_from(&args.keyword)?
        .method("get_y", |attributes, _args| {
            Ok(attributes.get("y").cloned().unwrap_or(Value::Null))
        })
        .method("set_y", |attributes, args| {
            let y = args.arg(0).cloned().ok_or_else(|| {
                TargetError::invalid_arguments("set_y", "missing value for y")
            })?;
            attributes.insert("y", y);
            Ok(Value::Null)
        })
        .method("explode", |_attributes, _args| {
            Err(TargetError::failed("explode", "exploded on purpose"))
        })
        .method("panic", |_attributes, _args| panic!("runner bug"))
        .method("exit", |_attributes, args| {
            let code: i32 = args.arg_as(0)?;
            std::process::exit(code)
        })
        .build();
    Ok(Box::new(target))
}

pub fn runner_factory() -> ProxyFactory {
    wrap(TargetConstructor::local(build_runner)).with_config(fork_only())
}

pub fn spawn_runner() -> ProxyHandle {
    runner_factory()
        .spawn(vec![], Map::new())
        .expect("runner should spawn")
}

/// `echo(message, wait)` sleeps `wait` seconds and returns `message`.
pub struct Echo;

impl Target for Echo {
    fn methods(&self) -> Vec<String> {
        vec!["echo".to_string()]
    }

    fn attributes(&self) -> Vec<String> {
        Vec::new()
    }

    fn call(&mut self, selector: &str, args: CallArgs) -> Result<Value, TargetError> {
        match selector {
            "echo" => {
                let message = args
                    .param(0, "message")
                    .cloned()
                    .ok_or_else(|| TargetError::invalid_arguments(selector, "missing message"))?;
                let wait: f64 = args.param_as(1, "wait")?.unwrap_or(0.0);
                sleep(Duration::from_secs_f64(wait.max(0.0)));
                Ok(message)
            }
            _ => Err(TargetError::not_found(selector)),
        }
    }

    fn get(&self, selector: &str) -> Result<Value, TargetError> {
        Err(TargetError::not_found(selector))
    }

    fn set(&mut self, selector: &str, _value: Value) -> Result<(), TargetError> {
        Err(TargetError::not_found(selector))
    }
}

pub fn echo_factory() -> ProxyFactory {
    wrap(TargetConstructor::local(|_args| Ok(Box::new(Echo) as Box<dyn Target>)))
        .with_config(fork_only())
}

pub fn kwargs(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
