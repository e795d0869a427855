//! Sample targets this host can serve as a worker.

pub mod echo;
pub mod runner;

use subproxy_core::{TargetConstructor, TargetRegistry};

pub const RUNNER_TARGET: &str = "runner";
pub const ECHO_TARGET: &str = "echo";

pub fn runner_constructor() -> TargetConstructor {
    TargetConstructor::registered(RUNNER_TARGET, runner::build)
}

pub fn echo_constructor() -> TargetConstructor {
    TargetConstructor::registered(ECHO_TARGET, echo::build)
}

/// Every target an exec'd worker of this program can build.
pub fn registry() -> TargetRegistry {
    let mut registry = TargetRegistry::new();
    registry.insert(runner_constructor());
    registry.insert(echo_constructor());
    registry
}
