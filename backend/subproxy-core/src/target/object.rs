use crate::error::target::TargetError;
use crate::protocol::{Kwargs, Value};
use crate::target::{CallArgs, Target};
use crate::{INDEX_GET_SELECTOR, INDEX_SET_SELECTOR};

use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};

use serde::de::DeserializeOwned;

type Method = Box<dyn FnMut(&mut Attributes, CallArgs) -> Result<Value, TargetError>>;

/// Named attribute values of an [`ObjectTarget`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    values: BTreeMap<String, Value>,
}

impl Attributes {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.values.get_mut(name)
    }

    #[track_caller]
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<T, TargetError> {
        let value = self.get(name).ok_or_else(|| TargetError::not_found(name))?;
        serde_json::from_value(value.clone())
            .map_err(|e| TargetError::failed(name, format!("unexpected attribute type: {e}")))
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(name.into(), value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

/// A target made of an attribute map and closure methods.
///
/// Methods receive the attribute map mutably, so `set_y` style setters and computed getters
/// need no extra state. Item access (`__getitem__` / `__setitem__`) is opt-in and indexes
/// the same attribute map by string key.
pub struct ObjectTarget {
    attributes: Attributes,
    methods: BTreeMap<String, Method>,
    open: bool,
}

impl ObjectTarget {
    pub fn builder() -> ObjectTargetBuilder {
        ObjectTargetBuilder::default()
    }

    pub fn attribute_map(&self) -> &Attributes {
        &self.attributes
    }
}

impl Debug for ObjectTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ObjectTarget")
            .field("attributes", &self.attributes)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("open", &self.open)
            .finish()
    }
}

impl Target for ObjectTarget {
    fn methods(&self) -> Vec<String> {
        self.methods.keys().cloned().collect()
    }

    fn attributes(&self) -> Vec<String> {
        self.attributes.names()
    }

    fn call(&mut self, selector: &str, args: CallArgs) -> Result<Value, TargetError> {
        match self.methods.get_mut(selector) {
            Some(method) => method(&mut self.attributes, args),
            None if self.attributes.contains(selector) => Err(TargetError::failed(
                selector,
                format!("attribute '{selector}' is not callable"),
            )),
            None => Err(TargetError::not_found(selector)),
        }
    }

    fn get(&self, selector: &str) -> Result<Value, TargetError> {
        if let Some(value) = self.attributes.get(selector) {
            return Ok(value.clone());
        }
        if self.methods.contains_key(selector) {
            return Err(TargetError::failed(
                selector,
                format!("'{selector}' is a method and cannot be read as a value"),
            ));
        }
        Err(TargetError::not_found(selector))
    }

    fn set(&mut self, selector: &str, value: Value) -> Result<(), TargetError> {
        if self.methods.contains_key(selector) {
            return Err(TargetError::failed(
                selector,
                format!("method '{selector}' cannot be reassigned"),
            ));
        }
        if !self.open && !self.attributes.contains(selector) {
            return Err(TargetError::not_found(selector));
        }
        self.attributes.insert(selector, value);
        Ok(())
    }
}

#[derive(Default)]
pub struct ObjectTargetBuilder {
    attributes: Attributes,
    methods: BTreeMap<String, Method>,
    open: bool,
}

impl ObjectTargetBuilder {
    pub fn attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name, value);
        self
    }

    /// Overwrite declared attributes with keyword arguments of the same name.
    ///
    /// Unknown keywords are rejected unless [`open_attributes`](Self::open_attributes) was
    /// called first.
    #[track_caller]
    pub fn attributes_from(mut self, kwargs: &Kwargs) -> Result<Self, TargetError> {
        for (name, value) in kwargs {
            if !self.open && !self.attributes.contains(name) {
                return Err(TargetError::invalid_arguments(
                    name,
                    format!("unexpected keyword argument '{name}'"),
                ));
            }
            self.attributes.insert(name.clone(), value.clone());
        }
        Ok(self)
    }

    pub fn method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: FnMut(&mut Attributes, CallArgs) -> Result<Value, TargetError> + 'static,
    {
        self.methods.insert(name.into(), Box::new(method));
        self
    }

    /// Expose the attribute map through `__getitem__` / `__setitem__`.
    pub fn item_access(self) -> Self {
        self.method(INDEX_GET_SELECTOR, |attributes, args| {
            let key: String = args.arg_as(0)?;
            attributes
                .get(&key)
                .cloned()
                .ok_or_else(|| TargetError::failed(INDEX_GET_SELECTOR, format!("no item '{key}'")))
        })
        .method(INDEX_SET_SELECTOR, |attributes, args| {
            let key: String = args.arg_as(0)?;
            let value = args.arg(1).cloned().ok_or_else(|| {
                TargetError::invalid_arguments(INDEX_SET_SELECTOR, "missing item value")
            })?;
            attributes.insert(key, value);
            Ok(Value::Null)
        })
    }

    /// Accept assignments to attributes that were not declared up front.
    pub fn open_attributes(mut self) -> Self {
        self.open = true;
        self
    }

    pub fn build(self) -> ObjectTarget {
        ObjectTarget {
            attributes: self.attributes,
            methods: self.methods,
            open: self.open,
        }
    }
}
