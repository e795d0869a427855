use common::ErrorLocation;

use std::io::Error as IoError;
use std::io::ErrorKind;
use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ChannelError {
    #[error("Channel IO Error: {message} {location}")]
    Io {
        message: String,
        location: ErrorLocation,
        #[source]
        source: IoError,
    },

    #[error("Channel Closed Error: {message} {location}")]
    Closed {
        message: String,
        location: ErrorLocation,
    },

    #[error("Frame Error: {message} {location}")]
    Frame {
        message: String,
        location: ErrorLocation,
    },

    /// Message larger than the frame limit; nothing was written, or the oversized frame was
    /// skipped, so the stream is still aligned.
    #[error("Oversized Frame Error: {message} {location}")]
    Oversized {
        message: String,
        location: ErrorLocation,
    },

    #[error("Encode Error: {message} {location}")]
    Encode {
        message: String,
        location: ErrorLocation,
    },

    #[error("Decode Error: {message} {location}")]
    Decode {
        message: String,
        location: ErrorLocation,
    },
}

impl ChannelError {
    /// True when the peer endpoint is gone (EOF or broken pipe).
    pub fn is_closed(&self) -> bool {
        match self {
            ChannelError::Closed { .. } => true,
            ChannelError::Io { source, .. } => matches!(
                source.kind(),
                ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }

    /// True when only this one message was rejected and the channel can carry the next.
    pub fn is_message_rejected(&self) -> bool {
        matches!(
            self,
            ChannelError::Oversized { .. } | ChannelError::Encode { .. }
        )
    }
}

impl From<IoError> for ChannelError {
    #[track_caller]
    fn from(error: IoError) -> Self {
        ChannelError::Io {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
            source: error,
        }
    }
}
