//! Worker side of a proxy: construct the target, announce it, serve requests.

pub mod dispatch;

pub use dispatch::DispatchLoop;

use crate::WORKER_FLAG;
use crate::channel::Channel;
use crate::error::worker::WorkerError;
use crate::protocol::{Bootstrap, Handshake, Kwargs, RemoteError, RemoteErrorKind, Value};
use crate::target::CallArgs;
use crate::target::registry::{TargetConstructor, TargetRegistry};

use common::ErrorLocation;

use std::env::args as env_args;
use std::panic::{AssertUnwindSafe, Location, catch_unwind};
use std::process::exit;

use log::{error, info, warn};

/// Serve as a worker if the process was started with the worker flag.
///
/// Call this first thing in `main` of every program that may be used as a worker host. It
/// returns immediately in normal mode; in worker mode it never returns and the process
/// exits once the client closes its endpoint.
pub fn serve_if_worker(registry: &TargetRegistry) {
    if !is_worker_invocation(env_args()) {
        return;
    }

    match serve_stdio(registry) {
        Ok(()) => exit(0),
        Err(e) => {
            error!("Worker failed: {e}");
            exit(1)
        }
    }
}

pub fn is_worker_invocation<I>(args: I) -> bool
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    args.into_iter().skip(1).any(|arg| arg.as_ref() == WORKER_FLAG)
}

/// Run the exec-strategy worker protocol on stdin/stdout.
pub fn serve_stdio(registry: &TargetRegistry) -> Result<(), WorkerError> {
    let mut channel = Channel::stdio();
    let bootstrap: Bootstrap = channel.recv()?;
    let mut channel = channel.with_max_frame_bytes(bootstrap.max_frame_bytes);

    info!(
        "Worker {} bootstrapping target '{}' (frame limit {} bytes)",
        std::process::id(),
        bootstrap.target,
        bootstrap.max_frame_bytes
    );

    let Some(constructor) = registry.get(&bootstrap.target) else {
        let reason = format!(
            "no target registered as '{}' (known: {})",
            bootstrap.target,
            registry.names().join(", ")
        );
        warn!("{reason}");
        channel.send(&Handshake::Unsupported { reason })?;
        return Err(WorkerError::UnknownTarget {
            target: bootstrap.target,
            location: ErrorLocation::from(Location::caller()),
        });
    };

    run_worker(
        constructor,
        bootstrap.args,
        bootstrap.kwargs,
        &bootstrap.token,
        channel,
    )
}

/// Construct the target and serve it until the client goes away.
///
/// A constructor error or panic is reported through a failed handshake instead of an
/// announcement, so the parent can stop its fallback chain.
pub fn run_worker(
    constructor: &TargetConstructor,
    args: Vec<Value>,
    kwargs: Kwargs,
    token: &str,
    mut channel: Channel,
) -> Result<(), WorkerError> {
    let label = constructor.name().unwrap_or("<local>").to_string();
    let call_args = CallArgs::new(label.as_str(), args, kwargs);

    let constructed = catch_unwind(AssertUnwindSafe(|| constructor.construct(call_args)));

    let failure = match constructed {
        Ok(Ok(target)) => {
            let mut dispatch = DispatchLoop::new(target, channel);
            dispatch.announce(token)?;
            dispatch.run()?;
            return Ok(());
        }
        Ok(Err(e)) => RemoteError::new(e.kind(), label.as_str(), e.detail()),
        Err(payload) => RemoteError::new(
            RemoteErrorKind::Panicked,
            label.as_str(),
            dispatch::panic_message(payload.as_ref()),
        ),
    };

    warn!("Target '{label}' could not be constructed: {}", failure.message);
    channel.send(&Handshake::Failed(failure.clone()))?;

    Err(WorkerError::Construction {
        message: format!("Target '{label}' failed to construct: {}", failure.message),
        location: ErrorLocation::from(Location::caller()),
    })
}
