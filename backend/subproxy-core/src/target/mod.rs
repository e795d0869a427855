//! The object surface a worker exposes.

pub mod object;
pub mod registry;

use crate::error::target::TargetError;
use crate::protocol::{Kwargs, Value};

use serde::de::DeserializeOwned;

/// Arguments of a single call, as they arrived over the channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub selector: String,
    pub positional: Vec<Value>,
    pub keyword: Kwargs,
}

impl CallArgs {
    pub fn new(selector: impl Into<String>, positional: Vec<Value>, keyword: Kwargs) -> Self {
        Self {
            selector: selector.into(),
            positional,
            keyword,
        }
    }

    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    pub fn kwarg(&self, name: &str) -> Option<&Value> {
        self.keyword.get(name)
    }

    /// Positional argument `index`, falling back to keyword `name`.
    pub fn param(&self, index: usize, name: &str) -> Option<&Value> {
        self.arg(index).or_else(|| self.kwarg(name))
    }

    #[track_caller]
    pub fn arg_as<T: DeserializeOwned>(&self, index: usize) -> Result<T, TargetError> {
        let value = self.arg(index).ok_or_else(|| {
            TargetError::invalid_arguments(
                &self.selector,
                format!("missing positional argument {index}"),
            )
        })?;
        self.decode(value, &format!("argument {index}"))
    }

    /// Like [`param`](Self::param), deserialized; `Ok(None)` when absent.
    #[track_caller]
    pub fn param_as<T: DeserializeOwned>(
        &self,
        index: usize,
        name: &str,
    ) -> Result<Option<T>, TargetError> {
        match self.param(index, name) {
            Some(value) => self.decode(value, name).map(Some),
            None => Ok(None),
        }
    }

    #[track_caller]
    fn decode<T: DeserializeOwned>(&self, value: &Value, what: &str) -> Result<T, TargetError> {
        serde_json::from_value(value.clone()).map_err(|e| {
            TargetError::invalid_arguments(&self.selector, format!("{what}: {e}"))
        })
    }
}

/// An object that can live inside a worker.
///
/// `methods` and `attributes` are read once, right after construction, to build the
/// capability set. Implementations run on the worker's single dispatch thread and need no
/// synchronization of their own.
pub trait Target {
    fn methods(&self) -> Vec<String>;

    fn attributes(&self) -> Vec<String>;

    fn call(&mut self, selector: &str, args: CallArgs) -> Result<Value, TargetError>;

    fn get(&self, selector: &str) -> Result<Value, TargetError>;

    fn set(&mut self, selector: &str, value: Value) -> Result<(), TargetError>;
}
