//! Process-isolated object proxies.
//!
//! A [`ProxyHandle`] looks like a local object but forwards every named access to a
//! worker process that exclusively owns the real instance. The worker is started by
//! [`ProxyFactory::spawn`] (exec of a worker host program, or `fork(2)` as a fallback),
//! announces the callable members of its target once, and then serves one request at a
//! time over a framed [`channel::Channel`].

pub mod channel;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod protocol;
pub mod proxy;
pub mod target;
pub mod worker;

#[cfg(test)]
mod tests;

pub use config::{ProxyConfig, SpawnStrategy, TerminationSignal};
pub use error::CoreError;
pub use lifecycle::{ProxyFactory, wrap};
pub use lifecycle::info::{WorkerInfo, WorkerInfoBuilder};
pub use protocol::{Kwargs, Value};
pub use proxy::asynchronous::AsyncProxy;
pub use proxy::{BoundMethod, Member, ProxyHandle};
pub use target::object::{Attributes, ObjectTarget, ObjectTargetBuilder};
pub use target::registry::{TargetConstructor, TargetRegistry};
pub use target::{CallArgs, Target};

/// Argument that switches a worker host program into worker mode.
pub const WORKER_FLAG: &str = "--subproxy-worker";

/// Selector an `IndexGet` request is dispatched to.
pub const INDEX_GET_SELECTOR: &str = "__getitem__";
/// Selector an `IndexSet` request is dispatched to.
pub const INDEX_SET_SELECTOR: &str = "__setitem__";

pub const ENV_PREFIX: &str = "SUBPROXY_";
pub const ENV_STRATEGIES: &str = const_format::concatcp!(ENV_PREFIX, "STRATEGIES");
pub const ENV_WORKER_PROGRAM: &str = const_format::concatcp!(ENV_PREFIX, "WORKER_PROGRAM");
pub const ENV_TERMINATION_SIGNAL: &str =
    const_format::concatcp!(ENV_PREFIX, "TERMINATION_SIGNAL");
pub const ENV_MAX_FRAME_BYTES: &str = const_format::concatcp!(ENV_PREFIX, "MAX_FRAME_BYTES");
