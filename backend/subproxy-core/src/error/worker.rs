use crate::error::channel::ChannelError;

use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

/// Failures that end a worker's dispatch loop.
#[derive(Debug, ThisError)]
pub enum WorkerError {
    #[error("Worker Transport Error: {message} {location}")]
    Transport {
        message: String,
        location: ErrorLocation,
        #[source]
        source: ChannelError,
    },

    #[error("Unknown Target Error: '{target}' {location}")]
    UnknownTarget {
        target: String,
        location: ErrorLocation,
    },

    #[error("Worker Construction Error: {message} {location}")]
    Construction {
        message: String,
        location: ErrorLocation,
    },
}

impl From<ChannelError> for WorkerError {
    #[track_caller]
    fn from(error: ChannelError) -> Self {
        WorkerError::Transport {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
            source: error,
        }
    }
}
