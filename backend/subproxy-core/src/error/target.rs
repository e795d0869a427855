use crate::protocol::RemoteErrorKind;

use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

/// Errors a [`Target`](crate::target::Target) implementation reports back to the worker.
///
/// These never cross the process boundary as-is: the dispatch loop turns them into a
/// tagged [`RemoteError`](crate::protocol::RemoteError) and keeps serving.
#[derive(Debug, ThisError)]
pub enum TargetError {
    #[error("Member Not Found Error: '{selector}' {location}")]
    NotFound {
        selector: String,
        location: ErrorLocation,
    },

    #[error("Invalid Arguments Error: '{selector}': {message} {location}")]
    InvalidArguments {
        selector: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("Target Failed Error: '{selector}': {message} {location}")]
    Failed {
        selector: String,
        message: String,
        location: ErrorLocation,
    },
}

impl TargetError {
    #[track_caller]
    pub fn not_found(selector: impl Into<String>) -> Self {
        TargetError::NotFound {
            selector: selector.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn invalid_arguments(selector: impl Into<String>, message: impl Into<String>) -> Self {
        TargetError::InvalidArguments {
            selector: selector.into(),
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn failed(selector: impl Into<String>, message: impl Into<String>) -> Self {
        TargetError::Failed {
            selector: selector.into(),
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    pub fn kind(&self) -> RemoteErrorKind {
        match self {
            TargetError::NotFound { .. } => RemoteErrorKind::NotFound,
            TargetError::InvalidArguments { .. } => RemoteErrorKind::InvalidArguments,
            TargetError::Failed { .. } => RemoteErrorKind::Failed,
        }
    }

    pub fn selector(&self) -> &str {
        match self {
            TargetError::NotFound { selector, .. }
            | TargetError::InvalidArguments { selector, .. }
            | TargetError::Failed { selector, .. } => selector,
        }
    }

    /// Message without the selector and location decorations.
    pub fn detail(&self) -> String {
        match self {
            TargetError::NotFound { selector, .. } => format!("no member named '{selector}'"),
            TargetError::InvalidArguments { message, .. } | TargetError::Failed { message, .. } => {
                message.clone()
            }
        }
    }
}
