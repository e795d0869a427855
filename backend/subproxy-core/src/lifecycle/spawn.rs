//! Worker creation with ordered strategy fallback.
//!
//! A strategy attempt is "start the process, then complete the handshake". Any attempt
//! failure is logged and the next strategy is tried; only a failed target constructor stops
//! the chain, since every other strategy would run the same constructor again.

use crate::WORKER_FLAG;
use crate::channel::Channel;
use crate::config::{ProxyConfig, SpawnStrategy};
use crate::error::spawn::SpawnError;
use crate::lifecycle::info::{WorkerInfo, WorkerInfoBuilder};
use crate::lifecycle::process::WorkerProcess;
use crate::protocol::{Announcement, Bootstrap, Handshake, Kwargs, Value};
use crate::target::registry::TargetConstructor;

use common::ErrorLocation;

use std::env::current_exe;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::{debug, info, trace, warn};
use uuid::Uuid;

#[cfg(target_os = "linux")]
const INHERITED_FD_DIR: &str = "/proc/self/fd";
#[cfg(all(unix, not(target_os = "linux")))]
const INHERITED_FD_DIR: &str = "/dev/fd";
#[cfg(unix)]
const STDERR_FD: std::os::fd::RawFd = 2;

/// A worker that finished its handshake, ready to be owned by a proxy handle.
pub(crate) struct SpawnedWorker {
    pub(crate) channel: Channel,
    pub(crate) process: WorkerProcess,
    pub(crate) announcement: Announcement,
    pub(crate) info: WorkerInfo,
}

struct Launched {
    channel: Channel,
    process: WorkerProcess,
    program: Option<PathBuf>,
}

pub(crate) fn build_worker_command(program: &Path) -> Command {
    let mut cmd = Command::new(program);
    cmd.arg(WORKER_FLAG)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit());
    cmd
}

/// Start a worker for `constructor`, trying each configured strategy in order.
pub(crate) fn spawn_worker(
    constructor: &TargetConstructor,
    config: &ProxyConfig,
    args: &[Value],
    kwargs: &Kwargs,
) -> Result<SpawnedWorker, SpawnError> {
    let token = Uuid::new_v4().to_string();
    let label = constructor.name().unwrap_or("<local>");
    let mut failures = Vec::new();

    for &strategy in &config.strategies {
        debug!("Spawning worker for '{label}' with {strategy} strategy");

        match attempt(strategy, constructor, config, &token, args, kwargs) {
            Ok(worker) => {
                info!(
                    "Worker for '{label}' ready via {strategy} (PID: {})",
                    worker.info.pid
                );
                return Ok(worker);
            }
            Err(e @ SpawnError::Target { .. }) => {
                warn!("Target '{label}' failed to construct, not trying other strategies");
                return Err(e);
            }
            Err(e) => {
                warn!("{strategy} strategy failed for '{label}': {e}");
                failures.push(format!("{strategy}: {e}"));
            }
        }
    }

    Err(SpawnError::Exhausted {
        message: format!(
            "Could not start a worker for '{label}'; all strategies failed ({})",
            failures.join("; ")
        ),
        location: ErrorLocation::from(Location::caller()),
    })
}

fn attempt(
    strategy: SpawnStrategy,
    constructor: &TargetConstructor,
    config: &ProxyConfig,
    token: &str,
    args: &[Value],
    kwargs: &Kwargs,
) -> Result<SpawnedWorker, SpawnError> {
    let Launched {
        mut channel,
        mut process,
        program,
    } = match strategy {
        SpawnStrategy::Exec => launch_exec(constructor, config, token, args, kwargs)?,
        SpawnStrategy::Fork => launch_fork(constructor, config, token, args, kwargs)?,
    };

    let result = handshake(&mut channel, token, process.pid()).and_then(|announcement| {
        let mut builder = WorkerInfoBuilder::default()
            .with_pid(process.pid())
            .with_strategy(strategy);
        if let Some(program) = &program {
            builder = builder.with_program(program.clone());
        }
        if let Some(name) = constructor.name() {
            builder = builder.with_target(name);
        }
        Ok((announcement, builder.build()?))
    });

    match result {
        Ok((announcement, info)) => Ok(SpawnedWorker {
            channel,
            process,
            announcement,
            info,
        }),
        Err(e) => {
            drop(channel);
            if let Err(te) = process.terminate(config.termination_signal) {
                warn!("Failed to reap worker {} after failed handshake: {te}", process.pid());
            }
            Err(e)
        }
    }
}

fn launch_exec(
    constructor: &TargetConstructor,
    config: &ProxyConfig,
    token: &str,
    args: &[Value],
    kwargs: &Kwargs,
) -> Result<Launched, SpawnError> {
    let Some(name) = constructor.name() else {
        return Err(SpawnError::NotTransportable {
            message: String::from(
                "Local constructors cannot be rebuilt in a fresh process; register the target by name",
            ),
            location: ErrorLocation::from(Location::caller()),
        });
    };

    let program = match &config.worker_program {
        Some(program) => program.clone(),
        None => current_exe().map_err(|e| SpawnError::Launch {
            message: format!("Failed to resolve current executable: {e}"),
            location: ErrorLocation::from(Location::caller()),
            source: Box::new(e),
        })?,
    };

    debug!("Executing worker host {}", program.display());

    let mut child = build_worker_command(&program)
        .spawn()
        .map_err(|e| SpawnError::Launch {
            message: format!("Failed to execute {}: {e}", program.display()),
            location: ErrorLocation::from(Location::caller()),
            source: Box::new(e),
        })?;

    let pipes = (child.stdin.take(), child.stdout.take());
    let mut process = WorkerProcess::Child(child);

    let (Some(stdin), Some(stdout)) = pipes else {
        if let Err(e) = process.terminate(config.termination_signal) {
            warn!("Failed to reap worker {}: {e}", process.pid());
        }
        return Err(SpawnError::Handshake {
            message: String::from("Worker pipes were not captured"),
            location: ErrorLocation::from(Location::caller()),
        });
    };

    trace!("Worker host started (PID: {})", process.pid());

    let mut channel = Channel::new(Box::new(stdout), Box::new(stdin))
        .with_max_frame_bytes(config.max_frame_bytes);

    let bootstrap = Bootstrap {
        token: token.to_string(),
        target: name.to_string(),
        args: args.to_vec(),
        kwargs: kwargs.clone(),
        max_frame_bytes: config.max_frame_bytes,
    };

    if let Err(e) = channel.send(&bootstrap) {
        drop(channel);
        if let Err(te) = process.terminate(config.termination_signal) {
            warn!("Failed to reap worker {}: {te}", process.pid());
        }
        return Err(SpawnError::Handshake {
            message: format!("Failed to send bootstrap to {}: {e}", program.display()),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    Ok(Launched {
        channel,
        process,
        program: Some(program),
    })
}

#[cfg(unix)]
fn launch_fork(
    constructor: &TargetConstructor,
    config: &ProxyConfig,
    token: &str,
    args: &[Value],
    kwargs: &Kwargs,
) -> Result<Launched, SpawnError> {
    use crate::error::worker::WorkerError;
    use crate::worker::run_worker;

    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixStream;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use log::LevelFilter;
    use nix::unistd::{ForkResult, fork};

    let (parent_stream, child_stream) = UnixStream::pair().map_err(|e| SpawnError::Launch {
        message: format!("Failed to create socket pair: {e}"),
        location: ErrorLocation::from(Location::caller()),
        source: Box::new(e),
    })?;

    let parent_end = Channel::from_unix_stream(parent_stream)
        .map_err(|e| SpawnError::Launch {
            message: format!("Failed to wrap socket: {e}"),
            location: ErrorLocation::from(Location::caller()),
            source: Box::new(e),
        })?
        .with_max_frame_bytes(config.max_frame_bytes);

    // SAFETY: the child only runs the worker loop on the forking thread and leaves through
    // `exit_child`, never returning into the caller's stack.
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => {
            drop(child_stream);
            trace!("Forked worker (PID: {child})");
            Ok(Launched {
                channel: parent_end,
                process: WorkerProcess::Forked(child),
                program: None,
            })
        }
        Ok(ForkResult::Child) => {
            // Another parent thread may have held a log sink's lock at fork time; the copy of
            // that lock in this process would never be released.
            log::set_max_level(LevelFilter::Off);
            drop(parent_end);
            close_inherited_fds(child_stream.as_raw_fd());

            let served = catch_unwind(AssertUnwindSafe(|| -> Result<(), WorkerError> {
                let channel = Channel::from_unix_stream(child_stream)?
                    .with_max_frame_bytes(config.max_frame_bytes);
                run_worker(constructor, args.to_vec(), kwargs.clone(), token, channel)
            }));
            match served {
                Ok(Ok(())) => exit_child(0),
                _ => exit_child(1),
            }
        }
        Err(e) => Err(SpawnError::Launch {
            message: format!("fork failed: {e}"),
            location: ErrorLocation::from(Location::caller()),
            source: Box::new(e),
        }),
    }
}

/// Leave a forked child without running the exit hooks it inherited from the parent.
#[cfg(unix)]
fn exit_child(code: i32) -> ! {
    // SAFETY: `_exit` only ends the calling process; nothing in the child runs afterwards.
    unsafe { nix::libc::_exit(code) }
}

/// Close every descriptor the forked child inherited except stdio and its own socket.
///
/// Endpoints of other handles must not stay open in this worker, or their workers would
/// never see EOF.
#[cfg(unix)]
fn close_inherited_fds(keep: std::os::fd::RawFd) {
    let Ok(entries) = std::fs::read_dir(INHERITED_FD_DIR) else {
        return;
    };

    let fds: Vec<std::os::fd::RawFd> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| entry.file_name().to_str().and_then(|name| name.parse().ok()))
        .collect();

    for fd in fds {
        if fd > STDERR_FD && fd != keep {
            let _ = nix::unistd::close(fd);
        }
    }
}

#[cfg(not(unix))]
fn launch_fork(
    _constructor: &TargetConstructor,
    _config: &ProxyConfig,
    _token: &str,
    _args: &[Value],
    _kwargs: &Kwargs,
) -> Result<Launched, SpawnError> {
    Err(SpawnError::Launch {
        message: String::from("The fork strategy is only available on Unix"),
        location: ErrorLocation::from(Location::caller()),
        source: Box::new(std::io::Error::from(std::io::ErrorKind::Unsupported)),
    })
}

/// Wait for the worker's single announcement and check it belongs to this spawn.
fn handshake(channel: &mut Channel, token: &str, pid: u32) -> Result<Announcement, SpawnError> {
    let handshake: Handshake = channel.recv().map_err(|e| SpawnError::Handshake {
        message: format!("Worker {pid} did not announce itself: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    match handshake {
        Handshake::Ready(announcement) => {
            if announcement.token != token {
                return Err(SpawnError::Handshake {
                    message: format!("Worker {pid} answered with a foreign token"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }

            if announcement.pid != pid {
                return Err(SpawnError::Handshake {
                    message: format!(
                        "Worker announced PID {} but was started as {pid}",
                        announcement.pid
                    ),
                    location: ErrorLocation::from(Location::caller()),
                });
            }

            let invalid = announcement.capabilities.invalid_selectors();
            if !invalid.is_empty() {
                return Err(SpawnError::Handshake {
                    message: format!("Worker {pid} announced invalid selectors: {invalid:?}"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }

            debug!(
                "Worker {pid} announced methods {:?}",
                announcement.capabilities.methods()
            );
            Ok(announcement)
        }
        Handshake::Unsupported { reason } => Err(SpawnError::Handshake {
            message: format!("Worker {pid} cannot build the target: {reason}"),
            location: ErrorLocation::from(Location::caller()),
        }),
        Handshake::Failed(failure) => Err(SpawnError::Target {
            message: format!(
                "'{}' {}: {}",
                failure.selector, failure.kind, failure.message
            ),
            location: ErrorLocation::from(Location::caller()),
        }),
    }
}
