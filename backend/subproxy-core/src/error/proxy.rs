use crate::error::channel::ChannelError;
use crate::protocol::RemoteErrorKind;

use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ProxyError {
    #[error("Member Not Found Error: '{selector}' {location}")]
    NotFound {
        selector: String,
        location: ErrorLocation,
    },

    #[error("Remote Error ({kind}): '{selector}': {message} {location}")]
    Remote {
        kind: RemoteErrorKind,
        selector: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("Transport Error: {message} {location}")]
    Transport {
        message: String,
        location: ErrorLocation,
        #[source]
        source: ChannelError,
    },

    #[error("Protocol Error: {message} {location}")]
    Protocol {
        message: String,
        location: ErrorLocation,
    },

    #[error("Poisoned Error: {message} {location}")]
    Poisoned {
        message: String,
        location: ErrorLocation,
    },

    #[error("Decode Error: '{selector}': {message} {location}")]
    Decode {
        selector: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("Teardown Error: {message} {location}")]
    Teardown {
        message: String,
        location: ErrorLocation,
    },

    #[error("Runtime Error: {message} {location}")]
    Runtime {
        message: String,
        location: ErrorLocation,
    },
}

impl ProxyError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProxyError::NotFound { .. })
    }
}

impl From<ChannelError> for ProxyError {
    #[track_caller]
    fn from(error: ChannelError) -> Self {
        ProxyError::Transport {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
            source: error,
        }
    }
}
