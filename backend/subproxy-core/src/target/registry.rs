use crate::error::target::TargetError;
use crate::target::{CallArgs, Target};

use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use log::debug;

type BuildFn = dyn Fn(CallArgs) -> Result<Box<dyn Target>, TargetError> + Send + Sync;

/// How to build a target inside a worker.
///
/// A *registered* constructor carries a name that a freshly exec'd worker host program can
/// resolve through its own [`TargetRegistry`]; it is transportable. A *local* constructor
/// is just a closure, so it can only run in a forked copy of the current process.
#[derive(Clone)]
pub struct TargetConstructor {
    name: Option<String>,
    build: Arc<BuildFn>,
}

impl TargetConstructor {
    pub fn registered<F>(name: impl Into<String>, build: F) -> Self
    where
        F: Fn(CallArgs) -> Result<Box<dyn Target>, TargetError> + Send + Sync + 'static,
    {
        Self {
            name: Some(name.into()),
            build: Arc::new(build),
        }
    }

    pub fn local<F>(build: F) -> Self
    where
        F: Fn(CallArgs) -> Result<Box<dyn Target>, TargetError> + Send + Sync + 'static,
    {
        Self {
            name: None,
            build: Arc::new(build),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_transportable(&self) -> bool {
        self.name.is_some()
    }

    pub fn construct(&self, args: CallArgs) -> Result<Box<dyn Target>, TargetError> {
        (self.build)(args)
    }
}

impl Debug for TargetConstructor {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("TargetConstructor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Named constructors a worker host program can build on request.
#[derive(Debug, Clone, Default)]
pub struct TargetRegistry {
    constructors: HashMap<String, TargetConstructor>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `build` under `name` and return the transportable constructor for it.
    pub fn register<F>(&mut self, name: impl Into<String>, build: F) -> TargetConstructor
    where
        F: Fn(CallArgs) -> Result<Box<dyn Target>, TargetError> + Send + Sync + 'static,
    {
        let constructor = TargetConstructor::registered(name, build);
        self.insert(constructor.clone());
        constructor
    }

    /// Add an existing registered constructor. Local constructors are ignored.
    pub fn insert(&mut self, constructor: TargetConstructor) {
        match constructor.name() {
            Some(name) => {
                debug!("Registering target '{name}'");
                self.constructors.insert(name.to_string(), constructor);
            }
            None => debug!("Ignoring local constructor, it cannot be resolved by name"),
        }
    }

    pub fn get(&self, name: &str) -> Option<&TargetConstructor> {
        self.constructors.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.keys().cloned().collect();
        names.sort();
        names
    }
}
