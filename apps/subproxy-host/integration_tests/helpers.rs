//! Factories that exec this crate's own binary as the worker host.

use subproxy_host::targets::{echo_constructor, runner_constructor};

use subproxy_core::{ProxyConfig, ProxyFactory, SpawnStrategy, TargetConstructor, wrap};

use std::path::PathBuf;

use serde_json::{Map, Value};

pub fn host_program() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_subproxy-host"))
}

/// Exec only, so a broken worker host fails the test instead of quietly forking.
pub fn exec_only() -> ProxyConfig {
    ProxyConfig::default()
        .with_strategies(vec![SpawnStrategy::Exec])
        .with_worker_program(host_program())
}

pub fn exec_factory(constructor: TargetConstructor) -> ProxyFactory {
    wrap(constructor).with_config(exec_only())
}

pub fn runner_factory() -> ProxyFactory {
    exec_factory(runner_constructor())
}

pub fn echo_factory() -> ProxyFactory {
    exec_factory(echo_constructor())
}

pub fn kwargs(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
