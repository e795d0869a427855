//! Creating workers and binding them to proxy handles.

pub mod info;
pub mod process;
pub(crate) mod spawn;

use crate::config::ProxyConfig;
use crate::error::spawn::SpawnError;
use crate::protocol::{Kwargs, Value};
use crate::proxy::ProxyHandle;
use crate::target::registry::TargetConstructor;

use common::ErrorLocation;

use std::panic::Location;

use log::debug;

/// Turn a target constructor into a factory of isolated proxies.
pub fn wrap(constructor: TargetConstructor) -> ProxyFactory {
    ProxyFactory::new(constructor)
}

/// Produces [`ProxyHandle`]s, each bound to its own freshly started worker.
///
/// Every call to [`spawn`](Self::spawn) constructs the target exactly once, inside the new
/// worker, with the arguments given to that call.
#[derive(Debug, Clone)]
pub struct ProxyFactory {
    constructor: TargetConstructor,
    config: ProxyConfig,
}

impl ProxyFactory {
    pub fn new(constructor: TargetConstructor) -> Self {
        Self {
            constructor,
            config: ProxyConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ProxyConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn constructor(&self) -> &TargetConstructor {
        &self.constructor
    }

    /// Start a worker, construct the target in it and return the bound handle.
    ///
    /// # Errors
    ///
    /// * [`SpawnError::Target`] - the target constructor failed inside the worker
    /// * [`SpawnError::Exhausted`] - no strategy produced a working worker
    /// * [`SpawnError::Validation`] - the factory's config is invalid
    pub fn spawn(&self, args: Vec<Value>, kwargs: Kwargs) -> Result<ProxyHandle, SpawnError> {
        self.config.validate().map_err(|e| SpawnError::Validation {
            message: e.to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let worker = spawn::spawn_worker(&self.constructor, &self.config, &args, &kwargs)?;

        debug!(
            "Binding proxy handle to worker {} ({})",
            worker.info.pid, worker.info.strategy
        );

        Ok(ProxyHandle::new(
            worker.channel,
            worker.announcement.capabilities,
            worker.info,
            worker.process,
            self.config.termination_signal,
        ))
    }
}
