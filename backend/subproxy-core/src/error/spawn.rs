use common::ErrorLocation;

use std::error::Error as StdError;

use thiserror::Error as ThisError;

/// Failures while bringing a worker process up.
///
/// `Launch`, `NotTransportable` and `Handshake` describe a single strategy attempt and
/// make the lifecycle manager fall back to the next strategy. `Target` and `Exhausted`
/// are what a caller of `ProxyFactory::spawn` actually sees.
#[derive(Debug, ThisError)]
pub enum SpawnError {
    #[error("Launch Error: {message} {location}")]
    Launch {
        message: String,
        location: ErrorLocation,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("Not Transportable Error: {message} {location}")]
    NotTransportable {
        message: String,
        location: ErrorLocation,
    },

    #[error("Handshake Error: {message} {location}")]
    Handshake {
        message: String,
        location: ErrorLocation,
    },

    #[error("Target Construction Error: {message} {location}")]
    Target {
        message: String,
        location: ErrorLocation,
    },

    #[error("Construction Error: {message} {location}")]
    Exhausted {
        message: String,
        location: ErrorLocation,
    },

    #[error("Validation Error: {message} {location}")]
    Validation {
        message: String,
        location: ErrorLocation,
    },
}
