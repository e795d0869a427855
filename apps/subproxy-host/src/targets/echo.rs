use subproxy_core::error::target::TargetError;
use subproxy_core::{CallArgs, Target, Value};

use std::thread::sleep;
use std::time::Duration;

use log::trace;

const ECHO_METHOD: &str = "echo";
const DEFAULT_WAIT_SECONDS: f64 = 1.0;

/// Sleeps, then hands back what it was given.
#[derive(Debug, Default)]
pub struct WaitAndEcho;

pub fn build(_args: CallArgs) -> Result<Box<dyn Target>, TargetError> {
    Ok(Box::new(WaitAndEcho))
}

impl Target for WaitAndEcho {
    fn methods(&self) -> Vec<String> {
        vec![ECHO_METHOD.to_string()]
    }

    fn attributes(&self) -> Vec<String> {
        Vec::new()
    }

    fn call(&mut self, selector: &str, args: CallArgs) -> Result<Value, TargetError> {
        if selector != ECHO_METHOD {
            return Err(TargetError::not_found(selector));
        }

        let message = args
            .param(0, "message")
            .cloned()
            .ok_or_else(|| TargetError::invalid_arguments(selector, "missing message"))?;
        let wait: f64 = args.param_as(1, "wait")?.unwrap_or(DEFAULT_WAIT_SECONDS);

        let wait = Duration::try_from_secs_f64(wait).map_err(|e| {
            TargetError::invalid_arguments(selector, format!("invalid wait {wait}: {e}"))
        })?;

        trace!("Echoing after {wait:?}");
        sleep(wait);
        Ok(message)
    }

    fn get(&self, selector: &str) -> Result<Value, TargetError> {
        Err(TargetError::not_found(selector))
    }

    fn set(&mut self, selector: &str, _value: Value) -> Result<(), TargetError> {
        Err(TargetError::not_found(selector))
    }
}
