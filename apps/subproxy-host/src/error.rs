use common::ErrorLocation;

use std::panic::Location;

use serde::Serialize;
use subproxy_core::CoreError;
use subproxy_core::error::config::ConfigError;
use subproxy_core::error::proxy::ProxyError;
use subproxy_core::error::spawn::SpawnError;
use thiserror::Error;

/// Errors of the host application.
///
/// Core errors are flattened to their message so the whole enum stays serializable for the
/// demo report.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum HostError {
    /// Error from this app
    #[error("Host Error: {message} {location}")]
    Host {
        message: String,
        location: ErrorLocation,
    },

    /// Error from subproxy-core (spawn, proxy, config)
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        location: ErrorLocation,
    },

    /// Logger could not be set up
    #[error("Logger Error: {message} {location}")]
    Logger {
        message: String,
        location: ErrorLocation,
    },
}

impl From<CoreError> for HostError {
    #[track_caller]
    fn from(error: CoreError) -> Self {
        HostError::Core {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<SpawnError> for HostError {
    #[track_caller]
    fn from(error: SpawnError) -> Self {
        HostError::Core {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<ProxyError> for HostError {
    #[track_caller]
    fn from(error: ProxyError) -> Self {
        HostError::Core {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<ConfigError> for HostError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        HostError::Core {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
