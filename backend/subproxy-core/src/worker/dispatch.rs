//! The worker-side request loop.
//!
//! # Architecture
//!
//! The loop is the only owner of the target instance:
//! - One request is received, performed and answered before the next is read
//! - Target errors and panics become tagged responses; the loop keeps serving
//! - A result too large to frame is answered with a `Failed` error instead
//! - Only a transport failure ends the loop, and EOF from the client ends it cleanly

use crate::channel::Channel;
use crate::error::channel::ChannelError;
use crate::error::target::TargetError;
use crate::error::worker::WorkerError;
use crate::protocol::{
    Announcement, CapabilitySet, Handshake, Operation, RemoteError, RemoteErrorKind, Request,
    Response, Value,
};
use crate::target::{CallArgs, Target};
use crate::{INDEX_GET_SELECTOR, INDEX_SET_SELECTOR};

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use log::{debug, info, trace, warn};

pub struct DispatchLoop {
    target: Box<dyn Target>,
    channel: Channel,
    capabilities: CapabilitySet,
    served: u64,
}

impl DispatchLoop {
    /// Take ownership of a constructed target and snapshot its capability set.
    pub fn new(target: Box<dyn Target>, channel: Channel) -> Self {
        let capabilities = CapabilitySet::from_target(target.as_ref());
        Self {
            target,
            channel,
            capabilities,
            served: 0,
        }
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn served(&self) -> u64 {
        self.served
    }

    /// Send the one and only handshake announcement.
    pub fn announce(&mut self, token: &str) -> Result<(), WorkerError> {
        let announcement = Announcement {
            token: token.to_string(),
            pid: std::process::id(),
            capabilities: self.capabilities.clone(),
        };

        debug!(
            "Announcing {} methods and {} attributes",
            self.capabilities.methods().len(),
            self.capabilities.attributes().len()
        );

        self.channel.send(&Handshake::Ready(announcement))?;
        Ok(())
    }

    /// Serve requests until the client closes its endpoint.
    pub fn run(mut self) -> Result<u64, WorkerError> {
        info!("Worker {} serving requests", std::process::id());

        loop {
            let request: Request = match self.channel.recv() {
                Ok(request) => request,
                Err(e) if e.is_closed() => {
                    info!(
                        "Client closed the channel after {} requests, stopping worker",
                        self.served
                    );
                    return Ok(self.served);
                }
                Err(e) => {
                    warn!("Dispatch loop stopped on transport error: {e}");
                    return Err(e.into());
                }
            };

            let request_id = request.request_id;
            let selector = request.selector.clone();
            let response = self.dispatch(request);
            self.respond(request_id, selector, &response)?;
            self.served += 1;
        }
    }

    /// Send `response`, or a `Failed` error in its place when the value itself cannot be
    /// framed. Only transport failures are returned.
    fn respond(
        &mut self,
        request_id: u64,
        selector: String,
        response: &Response,
    ) -> Result<(), WorkerError> {
        match self.channel.send(response) {
            Ok(()) => Ok(()),
            Err(e) if e.is_message_rejected() => {
                warn!("Response to #{request_id} '{selector}' could not be sent: {e}");
                let message = if matches!(e, ChannelError::Oversized { .. }) {
                    format!(
                        "response exceeds frame limit of {} bytes",
                        self.channel.max_frame_bytes()
                    )
                } else {
                    String::from("response could not be encoded")
                };
                let replacement = Response::error(
                    request_id,
                    RemoteError::new(RemoteErrorKind::Failed, selector, message),
                );
                self.channel.send(&replacement)?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Perform one request against the target and build its response.
    pub fn dispatch(&mut self, request: Request) -> Response {
        let Request {
            request_id,
            op,
            selector,
            args,
            kwargs,
        } = request;

        trace!("Dispatching #{request_id} {op} '{selector}'");

        let target = &mut self.target;
        let outcome = catch_unwind(AssertUnwindSafe(|| -> Result<Option<Value>, TargetError> {
            match op {
                Operation::Call => target
                    .call(&selector, CallArgs::new(&selector, args, kwargs))
                    .map(Some),
                Operation::Get => target.get(&selector).map(Some),
                Operation::Set => {
                    let value = single_value(&selector, args)?;
                    target.set(&selector, value).map(|()| None)
                }
                Operation::IndexGet => target
                    .call(
                        INDEX_GET_SELECTOR,
                        CallArgs::new(INDEX_GET_SELECTOR, args, kwargs),
                    )
                    .map(Some),
                Operation::IndexSet => target
                    .call(
                        INDEX_SET_SELECTOR,
                        CallArgs::new(INDEX_SET_SELECTOR, args, kwargs),
                    )
                    .map(|_| None),
            }
        }));

        match outcome {
            Ok(Ok(Some(value))) => Response::value(request_id, value),
            Ok(Ok(None)) => Response::ack(request_id),
            Ok(Err(e)) => {
                debug!("Request #{request_id} '{selector}' failed: {e}");
                Response::error(request_id, RemoteError::from(&e))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!("Target panicked on '{selector}': {message}");
                Response::error(
                    request_id,
                    RemoteError::new(RemoteErrorKind::Panicked, selector, message),
                )
            }
        }
    }
}

#[track_caller]
fn single_value(selector: &str, args: Vec<Value>) -> Result<Value, TargetError> {
    let count = args.len();
    let mut args = args.into_iter();
    match (args.next(), count) {
        (Some(value), 1) => Ok(value),
        _ => Err(TargetError::invalid_arguments(
            selector,
            format!("set expects exactly one value, got {count}"),
        )),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
