//! Client side of a proxy.
//!
//! # Architecture
//!
//! A [`ProxyHandle`] owns the client endpoint of the channel and the worker process:
//! - Every named access becomes one request and waits for exactly one response
//! - One mutex is held for the whole round trip, so concurrent callers never see each
//!   other's responses
//! - Names announced as methods are handed out as [`BoundMethod`]s; everything else is read
//!   as a plain value
//! - Dropping or closing the handle terminates and reaps the worker

pub mod asynchronous;

use crate::channel::Channel;
use crate::config::TerminationSignal;
use crate::error::proxy::ProxyError;
use crate::lifecycle::info::WorkerInfo;
use crate::lifecycle::process::{WorkerProcess, is_running};
use crate::protocol::{
    CapabilitySet, Kwargs, Outcome, RemoteError, RemoteErrorKind, Request, Response, Value,
    is_valid_selector,
};

use common::ErrorLocation;

use std::panic::Location;
use std::sync::{Mutex, MutexGuard};

use log::{debug, info, trace, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;

struct Connection {
    channel: Option<Channel>,
    next_request_id: u64,
}

pub struct ProxyHandle {
    connection: Mutex<Connection>,
    capabilities: CapabilitySet,
    info: WorkerInfo,
    process: Mutex<Option<WorkerProcess>>,
    termination_signal: TerminationSignal,
}

/// Result of [`ProxyHandle::get`].
#[derive(Debug)]
pub enum Member<'a> {
    Method(BoundMethod<'a>),
    Value(Value),
}

impl<'a> Member<'a> {
    pub fn is_callable(&self) -> bool {
        matches!(self, Member::Method(_))
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Member::Value(value) => Some(value),
            Member::Method(_) => None,
        }
    }

    pub fn into_method(self) -> Option<BoundMethod<'a>> {
        match self {
            Member::Method(method) => Some(method),
            Member::Value(_) => None,
        }
    }
}

/// A method of the remote target; calling it performs one `Call` round trip.
#[derive(Debug, Clone)]
pub struct BoundMethod<'a> {
    handle: &'a ProxyHandle,
    selector: String,
}

impl BoundMethod<'_> {
    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn call(&self, args: Vec<Value>) -> Result<Value, ProxyError> {
        self.handle.call(&self.selector, args)
    }

    pub fn call_with(&self, args: Vec<Value>, kwargs: Kwargs) -> Result<Value, ProxyError> {
        self.handle.call_with(&self.selector, args, kwargs)
    }
}

impl ProxyHandle {
    pub(crate) fn new(
        channel: Channel,
        capabilities: CapabilitySet,
        info: WorkerInfo,
        process: WorkerProcess,
        termination_signal: TerminationSignal,
    ) -> Self {
        Self {
            connection: Mutex::new(Connection {
                channel: Some(channel),
                next_request_id: 1,
            }),
            capabilities,
            info,
            process: Mutex::new(Some(process)),
            termination_signal,
        }
    }

    /// Resolve `name` the way attribute access on a local object would.
    ///
    /// Announced methods come back as [`Member::Method`] without touching the worker;
    /// any other name is read with a `Get` round trip.
    pub fn get(&self, name: &str) -> Result<Member<'_>, ProxyError> {
        if self.capabilities.is_callable(name) {
            return Ok(Member::Method(BoundMethod {
                handle: self,
                selector: name.to_string(),
            }));
        }
        self.get_attr(name).map(Member::Value)
    }

    pub fn get_attr(&self, name: &str) -> Result<Value, ProxyError> {
        check_selector(name)?;
        let outcome = self.round_trip(|id| Request::get(id, name))?;
        expect_value(outcome, name)
    }

    pub fn get_attr_as<T: DeserializeOwned>(&self, name: &str) -> Result<T, ProxyError> {
        decode(self.get_attr(name)?, name)
    }

    /// Assign `value` to attribute `name` and wait for the worker's acknowledgement.
    pub fn set(&self, name: &str, value: impl Serialize) -> Result<(), ProxyError> {
        check_selector(name)?;
        let value = encode(value, name)?;
        let outcome = self.round_trip(|id| Request::set(id, name, value))?;
        expect_ack(outcome, name)
    }

    pub fn call(&self, name: &str, args: Vec<Value>) -> Result<Value, ProxyError> {
        self.call_with(name, args, Kwargs::new())
    }

    pub fn call_with(
        &self,
        name: &str,
        args: Vec<Value>,
        kwargs: Kwargs,
    ) -> Result<Value, ProxyError> {
        check_selector(name)?;
        let outcome = self.round_trip(|id| Request::call(id, name, args, kwargs))?;
        expect_value(outcome, name)
    }

    pub fn call_as<T: DeserializeOwned>(
        &self,
        name: &str,
        args: Vec<Value>,
    ) -> Result<T, ProxyError> {
        decode(self.call(name, args)?, name)
    }

    /// `handle[key]`, served by the target's `__getitem__`.
    pub fn get_item(&self, key: impl Serialize) -> Result<Value, ProxyError> {
        let key = encode(key, crate::INDEX_GET_SELECTOR)?;
        let outcome = self.round_trip(|id| Request::index_get(id, key))?;
        expect_value(outcome, crate::INDEX_GET_SELECTOR)
    }

    /// `handle[key] = value`, served by the target's `__setitem__`.
    pub fn set_item(&self, key: impl Serialize, value: impl Serialize) -> Result<(), ProxyError> {
        let key = encode(key, crate::INDEX_SET_SELECTOR)?;
        let value = encode(value, crate::INDEX_SET_SELECTOR)?;
        let outcome = self.round_trip(|id| Request::index_set(id, key, value))?;
        expect_ack(outcome, crate::INDEX_SET_SELECTOR)
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.capabilities.has_member(name)
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn info(&self) -> &WorkerInfo {
        &self.info
    }

    pub fn pid(&self) -> u32 {
        self.info.pid
    }

    pub fn is_worker_running(&self) -> bool {
        let owned = match self.process.lock() {
            Ok(guard) => guard.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        };
        owned && is_running(self.info.pid)
    }

    /// Terminate the worker and wait for it. Dropping the handle does the same.
    pub fn close(self) -> Result<(), ProxyError> {
        self.shutdown()
    }

    #[track_caller]
    fn lock_connection(&self) -> Result<MutexGuard<'_, Connection>, ProxyError> {
        self.connection.lock().map_err(|_| ProxyError::Poisoned {
            message: format!(
                "Connection to worker {} was poisoned by a panicking caller",
                self.info.pid
            ),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    fn round_trip<F>(&self, build: F) -> Result<Outcome, ProxyError>
    where
        F: FnOnce(u64) -> Request,
    {
        let mut connection = self.lock_connection()?;

        let request_id = connection.next_request_id;
        connection.next_request_id += 1;
        let request = build(request_id);

        trace!(
            "Request #{request_id} {} '{}' to worker {}",
            request.op, request.selector, self.info.pid
        );

        let channel = connection
            .channel
            .as_mut()
            .ok_or_else(|| ProxyError::Protocol {
                message: String::from("Proxy handle is already closed"),
                location: ErrorLocation::from(Location::caller()),
            })?;

        channel.send(&request)?;
        let response: Response = channel.recv()?;

        if response.request_id != request_id {
            return Err(ProxyError::Protocol {
                message: format!(
                    "Expected response to request #{request_id}, got #{}",
                    response.request_id
                ),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(response.outcome)
    }

    fn shutdown(&self) -> Result<(), ProxyError> {
        let process = match self.process.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        let Some(mut process) = process else {
            return Ok(());
        };

        match self.connection.lock() {
            Ok(mut connection) => connection.channel = None,
            Err(poisoned) => poisoned.into_inner().channel = None,
        }

        debug!("Stopping worker {} with {}", process.pid(), self.termination_signal);

        process
            .terminate(self.termination_signal)
            .map_err(|e| ProxyError::Teardown {
                message: format!("Failed to stop worker {}: {e}", process.pid()),
                location: ErrorLocation::from(Location::caller()),
            })?;

        info!("Worker {} stopped", self.info.pid);
        Ok(())
    }
}

impl std::fmt::Debug for ProxyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyHandle")
            .field("info", &self.info)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl Drop for ProxyHandle {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("Worker teardown failed: {e}");
        }
    }
}

#[track_caller]
fn check_selector(name: &str) -> Result<(), ProxyError> {
    if is_valid_selector(name) {
        Ok(())
    } else {
        Err(ProxyError::NotFound {
            selector: name.to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
    }
}

#[track_caller]
fn remote_error(error: RemoteError) -> ProxyError {
    match error.kind {
        RemoteErrorKind::NotFound => ProxyError::NotFound {
            selector: error.selector,
            location: ErrorLocation::from(Location::caller()),
        },
        kind => ProxyError::Remote {
            kind,
            selector: error.selector,
            message: error.message,
            location: ErrorLocation::from(Location::caller()),
        },
    }
}

#[track_caller]
fn expect_value(outcome: Outcome, selector: &str) -> Result<Value, ProxyError> {
    match outcome {
        Outcome::Value(value) => Ok(value),
        Outcome::Error(error) => Err(remote_error(error)),
        Outcome::Ack => Err(ProxyError::Protocol {
            message: format!("Expected a value for '{selector}', got an acknowledgement"),
            location: ErrorLocation::from(Location::caller()),
        }),
    }
}

#[track_caller]
fn expect_ack(outcome: Outcome, selector: &str) -> Result<(), ProxyError> {
    match outcome {
        Outcome::Ack => Ok(()),
        Outcome::Error(error) => Err(remote_error(error)),
        Outcome::Value(_) => Err(ProxyError::Protocol {
            message: format!("Expected an acknowledgement for '{selector}', got a value"),
            location: ErrorLocation::from(Location::caller()),
        }),
    }
}

#[track_caller]
fn encode(value: impl Serialize, selector: &str) -> Result<Value, ProxyError> {
    serde_json::to_value(value).map_err(|e| ProxyError::Decode {
        selector: selector.to_string(),
        message: format!("value cannot be sent: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })
}

#[track_caller]
fn decode<T: DeserializeOwned>(value: Value, selector: &str) -> Result<T, ProxyError> {
    serde_json::from_value(value).map_err(|e| ProxyError::Decode {
        selector: selector.to_string(),
        message: e.to_string(),
        location: ErrorLocation::from(Location::caller()),
    })
}
