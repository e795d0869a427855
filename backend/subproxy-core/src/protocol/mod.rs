//! Messages exchanged between a proxy handle and its worker.
//!
//! The order on the wire is fixed: an exec'd worker first receives a [`Bootstrap`], every
//! worker then sends exactly one [`Handshake`], and after that each [`Request`] is answered
//! by exactly one [`Response`] carrying the same `request_id`.

pub mod capabilities;

pub use capabilities::{CapabilitySet, is_valid_selector};

use crate::error::target::TargetError;

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

pub type Value = serde_json::Value;
pub type Kwargs = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Call,
    Get,
    Set,
    IndexGet,
    IndexSet,
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Operation::Call => "call",
            Operation::Get => "get",
            Operation::Set => "set",
            Operation::IndexGet => "index_get",
            Operation::IndexSet => "index_set",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub request_id: u64,
    pub op: Operation,
    pub selector: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Kwargs,
}

impl Request {
    pub fn call(
        request_id: u64,
        selector: impl Into<String>,
        args: Vec<Value>,
        kwargs: Kwargs,
    ) -> Self {
        Self {
            request_id,
            op: Operation::Call,
            selector: selector.into(),
            args,
            kwargs,
        }
    }

    pub fn get(request_id: u64, selector: impl Into<String>) -> Self {
        Self {
            request_id,
            op: Operation::Get,
            selector: selector.into(),
            args: Vec::new(),
            kwargs: Kwargs::new(),
        }
    }

    pub fn set(request_id: u64, selector: impl Into<String>, value: Value) -> Self {
        Self {
            request_id,
            op: Operation::Set,
            selector: selector.into(),
            args: vec![value],
            kwargs: Kwargs::new(),
        }
    }

    pub fn index_get(request_id: u64, key: Value) -> Self {
        Self {
            request_id,
            op: Operation::IndexGet,
            selector: crate::INDEX_GET_SELECTOR.to_string(),
            args: vec![key],
            kwargs: Kwargs::new(),
        }
    }

    pub fn index_set(request_id: u64, key: Value, value: Value) -> Self {
        Self {
            request_id,
            op: Operation::IndexSet,
            selector: crate::INDEX_SET_SELECTOR.to_string(),
            args: vec![key, value],
            kwargs: Kwargs::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum Outcome {
    Value(Value),
    Ack,
    Error(RemoteError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub request_id: u64,
    pub outcome: Outcome,
}

impl Response {
    pub fn value(request_id: u64, value: Value) -> Self {
        Self {
            request_id,
            outcome: Outcome::Value(value),
        }
    }

    pub fn ack(request_id: u64) -> Self {
        Self {
            request_id,
            outcome: Outcome::Ack,
        }
    }

    pub fn error(request_id: u64, error: RemoteError) -> Self {
        Self {
            request_id,
            outcome: Outcome::Error(error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorKind {
    NotFound,
    InvalidArguments,
    Failed,
    Panicked,
}

impl Display for RemoteErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            RemoteErrorKind::NotFound => "not found",
            RemoteErrorKind::InvalidArguments => "invalid arguments",
            RemoteErrorKind::Failed => "failed",
            RemoteErrorKind::Panicked => "panicked",
        };
        write!(f, "{name}")
    }
}

/// An error raised inside the worker, flattened for transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub selector: String,
    pub message: String,
}

impl RemoteError {
    pub fn new(
        kind: RemoteErrorKind,
        selector: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            selector: selector.into(),
            message: message.into(),
        }
    }
}

impl From<&TargetError> for RemoteError {
    fn from(error: &TargetError) -> Self {
        RemoteError::new(error.kind(), error.selector(), error.detail())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    pub token: String,
    pub pid: u32,
    pub capabilities: CapabilitySet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Handshake {
    Ready(Announcement),
    /// The target constructor ran and failed.
    Failed(RemoteError),
    /// The worker host cannot build the requested target at all.
    Unsupported { reason: String },
}

/// First message an exec'd worker receives: which registered target to build, and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bootstrap {
    pub token: String,
    pub target: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Kwargs,
    /// Frame limit of the parent's endpoint; the worker uses the same one.
    pub max_frame_bytes: usize,
}
