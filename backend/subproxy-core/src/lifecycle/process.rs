//! Worker process ownership and termination.

use crate::config::TerminationSignal;

use std::io::Error as IoError;
use std::process::Child;

use log::{debug, trace};
use sysinfo::{Pid, Process, ProcessStatus, ProcessesToUpdate, System};

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{Signal, kill};
#[cfg(unix)]
use nix::sys::wait::waitpid;
#[cfg(unix)]
use nix::unistd::Pid as NixPid;

/// A started worker, owned by exactly one proxy handle.
#[derive(Debug)]
pub enum WorkerProcess {
    /// Started by the exec strategy.
    Child(Child),
    /// Started by the fork strategy.
    #[cfg(unix)]
    Forked(NixPid),
}

impl WorkerProcess {
    pub fn pid(&self) -> u32 {
        match self {
            WorkerProcess::Child(child) => child.id(),
            #[cfg(unix)]
            WorkerProcess::Forked(pid) => pid.as_raw().unsigned_abs(),
        }
    }

    /// Signal the worker if it is still alive, then block until it has been reaped.
    pub fn terminate(&mut self, signal: TerminationSignal) -> Result<(), IoError> {
        let pid = self.pid();

        match self {
            WorkerProcess::Child(child) => {
                if child.try_wait()?.is_none() {
                    send_signal(pid, signal)?;
                }
                let status = child.wait()?;
                debug!("Worker {pid} exited with {status}");
            }
            #[cfg(unix)]
            WorkerProcess::Forked(nix_pid) => {
                send_signal(pid, signal)?;
                match waitpid(*nix_pid, None) {
                    Ok(status) => debug!("Worker {pid} exited with {status:?}"),
                    Err(Errno::ECHILD) => trace!("Worker {pid} was already reaped"),
                    Err(e) => return Err(IoError::from(e)),
                }
            }
        }

        Ok(())
    }
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: TerminationSignal) -> Result<(), IoError> {
    let nix_signal = match signal {
        TerminationSignal::Term => Signal::SIGTERM,
        TerminationSignal::Kill => Signal::SIGKILL,
    };

    let raw = i32::try_from(pid).map_err(IoError::other)?;

    match kill(NixPid::from_raw(raw), nix_signal) {
        Ok(()) => {
            debug!("Sent {signal} to worker {pid}");
            Ok(())
        }
        Err(Errno::ESRCH) => {
            trace!("Worker {pid} already gone before {signal}");
            Ok(())
        }
        Err(e) => Err(IoError::from(e)),
    }
}

#[cfg(not(unix))]
fn send_signal(pid: u32, signal: TerminationSignal) -> Result<(), IoError> {
    let killed = with_process(pid, |p| match signal {
        TerminationSignal::Term => p.kill_with(sysinfo::Signal::Term).unwrap_or_else(|| p.kill()),
        TerminationSignal::Kill => p.kill(),
    })
    .unwrap_or(false);
    debug!("Sent {signal} to worker {pid}: success={killed}");
    Ok(())
}

pub(crate) fn with_process<F, R>(pid: u32, f: F) -> Option<R>
where
    F: FnOnce(&Process) -> R,
{
    let target = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[target]), true);

    sys.process(target).map(f)
}

/// Whether `pid` names a live process. Zombies waiting to be reaped count as dead.
pub fn is_running(pid: u32) -> bool {
    with_process(pid, |p| !matches!(p.status(), ProcessStatus::Zombie | ProcessStatus::Dead))
        .unwrap_or(false)
}
