//! Framed, blocking, point-to-point message transport.
//!
//! Each message is one JSON document preceded by a `Content-Length: N` header and a blank
//! line. A channel owns exactly one reading and one writing half; both ends of a proxy
//! connection hold one `Channel` each.

use crate::error::channel::ChannelError;

use common::ErrorLocation;

use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Read, Write, copy, sink};
use std::panic::Location;

use log::trace;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

const CONTENT_LENGTH_HEADER: &str = "Content-Length: ";
const HEADER_TERMINATOR: &str = "\r\n";

pub struct Channel {
    reader: BufReader<Box<dyn Read + Send>>,
    writer: BufWriter<Box<dyn Write + Send>>,
    max_frame_bytes: usize,
}

impl Channel {
    pub fn new(reader: Box<dyn Read + Send>, writer: Box<dyn Write + Send>) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }

    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    /// Channel over the current process's stdin/stdout, used by exec'd workers.
    pub fn stdio() -> Self {
        Self::new(Box::new(std::io::stdin()), Box::new(std::io::stdout()))
    }

    /// Two connected endpoints backed by a Unix socket pair.
    #[cfg(unix)]
    #[track_caller]
    pub fn pair() -> Result<(Channel, Channel), ChannelError> {
        let (left, right) = std::os::unix::net::UnixStream::pair()?;
        Ok((Self::from_unix_stream(left)?, Self::from_unix_stream(right)?))
    }

    #[cfg(unix)]
    #[track_caller]
    pub fn from_unix_stream(stream: std::os::unix::net::UnixStream) -> Result<Self, ChannelError> {
        let reader = stream.try_clone()?;
        Ok(Self::new(Box::new(reader), Box::new(stream)))
    }

    /// Encode `message` as one frame and flush it.
    #[track_caller]
    pub fn send<T: Serialize>(&mut self, message: &T) -> Result<(), ChannelError> {
        let payload = serde_json::to_vec(message).map_err(|e| ChannelError::Encode {
            message: format!("Failed to encode message: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if payload.len() > self.max_frame_bytes {
            return Err(ChannelError::Oversized {
                message: format!(
                    "Outgoing frame of {} bytes exceeds limit of {} bytes",
                    payload.len(),
                    self.max_frame_bytes
                ),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        trace!("Sending frame of {} bytes", payload.len());

        write!(
            self.writer,
            "{CONTENT_LENGTH_HEADER}{}{HEADER_TERMINATOR}{HEADER_TERMINATOR}",
            payload.len()
        )?;
        self.writer.write_all(&payload)?;
        self.writer.flush()?;

        Ok(())
    }

    /// Block until one complete frame arrives and decode it.
    #[track_caller]
    pub fn recv<T: DeserializeOwned>(&mut self) -> Result<T, ChannelError> {
        let content_length = self.read_header()?;

        let mut payload = vec![0u8; content_length];
        match self.reader.read_exact(&mut payload) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(ChannelError::Closed {
                    message: format!("Peer closed the channel inside a {content_length} byte frame"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            Err(e) => return Err(e.into()),
        }

        trace!("Received frame of {content_length} bytes");

        serde_json::from_slice(&payload).map_err(|e| ChannelError::Decode {
            message: format!("Failed to decode frame: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    #[track_caller]
    fn read_header(&mut self) -> Result<usize, ChannelError> {
        let mut line = String::new();

        if self.reader.read_line(&mut line)? == 0 {
            return Err(ChannelError::Closed {
                message: "Peer closed the channel".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let header = line.trim_end();
        let content_length = header
            .strip_prefix(CONTENT_LENGTH_HEADER)
            .ok_or_else(|| ChannelError::Frame {
                message: format!("Expected Content-Length header, got: {header:?}"),
                location: ErrorLocation::from(Location::caller()),
            })?
            .parse::<usize>()
            .map_err(|e| ChannelError::Frame {
                message: format!("Invalid Content-Length {header:?}: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })?;

        self.read_blank_line()?;

        if content_length > self.max_frame_bytes {
            self.discard_payload(content_length)?;
            return Err(ChannelError::Oversized {
                message: format!(
                    "Incoming frame of {content_length} bytes exceeds limit of {} bytes",
                    self.max_frame_bytes
                ),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(content_length)
    }

    #[track_caller]
    fn read_blank_line(&mut self) -> Result<(), ChannelError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(ChannelError::Closed {
                message: "Peer closed the channel after a frame header".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        if !line.trim_end().is_empty() {
            return Err(ChannelError::Frame {
                message: format!("Expected blank line after header, got: {:?}", line.trim_end()),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(())
    }

    /// Read past a payload that will not be decoded, without buffering it.
    #[track_caller]
    fn discard_payload(&mut self, content_length: usize) -> Result<(), ChannelError> {
        let expected = content_length as u64;
        let skipped = copy(&mut (&mut self.reader).take(expected), &mut sink())?;

        if skipped < expected {
            return Err(ChannelError::Closed {
                message: format!("Peer closed the channel inside a {content_length} byte frame"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        trace!("Skipped oversized frame of {content_length} bytes");
        Ok(())
    }
}
