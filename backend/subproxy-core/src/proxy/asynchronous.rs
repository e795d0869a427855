//! Tokio facade over [`ProxyHandle`].
//!
//! Round trips block, so each one runs on the blocking thread pool. All clones share one
//! handle and therefore one lock and one worker.

use crate::error::CoreError;
use crate::error::proxy::ProxyError;
use crate::lifecycle::ProxyFactory;
use crate::protocol::{Kwargs, Value};
use crate::proxy::ProxyHandle;

use common::ErrorLocation;

use std::panic::Location;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::task::spawn_blocking;

#[derive(Debug, Clone)]
pub struct AsyncProxy {
    handle: Arc<ProxyHandle>,
}

impl AsyncProxy {
    pub fn new(handle: ProxyHandle) -> Self {
        Self {
            handle: Arc::new(handle),
        }
    }

    /// Spawn a worker from `factory` without blocking the runtime.
    pub async fn spawn(
        factory: ProxyFactory,
        args: Vec<Value>,
        kwargs: Kwargs,
    ) -> Result<Self, CoreError> {
        let handle = spawn_blocking(move || factory.spawn(args, kwargs))
            .await
            .map_err(|e| ProxyError::Runtime {
                message: format!("Spawn task failed: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })??;
        Ok(Self::new(handle))
    }

    pub fn handle(&self) -> &ProxyHandle {
        &self.handle
    }

    pub async fn get_attr(&self, name: &str) -> Result<Value, ProxyError> {
        let name = name.to_string();
        self.run_blocking(move |handle| handle.get_attr(&name)).await
    }

    pub async fn get_attr_as<T>(&self, name: &str) -> Result<T, ProxyError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let name = name.to_string();
        self.run_blocking(move |handle| handle.get_attr_as(&name)).await
    }

    pub async fn set(&self, name: &str, value: Value) -> Result<(), ProxyError> {
        let name = name.to_string();
        self.run_blocking(move |handle| handle.set(&name, value)).await
    }

    pub async fn call(&self, name: &str, args: Vec<Value>) -> Result<Value, ProxyError> {
        self.call_with(name, args, Kwargs::new()).await
    }

    pub async fn call_with(
        &self,
        name: &str,
        args: Vec<Value>,
        kwargs: Kwargs,
    ) -> Result<Value, ProxyError> {
        let name = name.to_string();
        self.run_blocking(move |handle| handle.call_with(&name, args, kwargs))
            .await
    }

    pub async fn get_item(&self, key: Value) -> Result<Value, ProxyError> {
        self.run_blocking(move |handle| handle.get_item(key)).await
    }

    pub async fn set_item(&self, key: Value, value: Value) -> Result<(), ProxyError> {
        self.run_blocking(move |handle| handle.set_item(key, value))
            .await
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.handle.has_member(name)
    }

    #[track_caller]
    fn run_blocking<F, R>(
        &self,
        f: F,
    ) -> impl Future<Output = Result<R, ProxyError>> + Send + 'static
    where
        F: FnOnce(&ProxyHandle) -> Result<R, ProxyError> + Send + 'static,
        R: Send + 'static,
    {
        let handle = Arc::clone(&self.handle);
        let location = ErrorLocation::from(Location::caller());
        async move {
            spawn_blocking(move || f(&handle))
                .await
                .map_err(|e| ProxyError::Runtime {
                    message: format!("Blocking round trip failed: {e}"),
                    location,
                })?
        }
    }
}
