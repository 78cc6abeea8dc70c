//! Error types for chiller links

use std::time::Duration;

use neslab_protocol::{BuildError, ParseError};
use thiserror::Error;

/// Errors that can occur while talking to a chiller
#[derive(Debug, Error)]
pub enum LinkError {
    /// The link was closed
    #[error("link is not open")]
    NotOpen,

    /// Failed to open serial port or socket
    #[error("failed to open {target}: {reason}")]
    OpenFailed { target: String, reason: String },

    /// Failed to enumerate serial ports
    #[error("failed to enumerate ports: {0}")]
    EnumerationFailed(String),

    /// No response arrived before the read deadline
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// I/O error on the underlying stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Request could not be built
    #[error(transparent)]
    Build(#[from] BuildError),

    /// Response failed validation or was an error frame
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Response was valid but not the shape the request expects, or
    /// answered a different command
    #[error("unexpected response to {command}")]
    UnexpectedResponse { command: String },

    /// A `set_*` command has no `req_*` counterpart to read its precision from
    #[error("no request command reads back {command}")]
    NoMatchingRequest { command: String },

    /// Value does not fit the two-byte integer a set command carries
    #[error("{value} is out of range for {command}")]
    ValueOutOfRange { command: String, value: f64 },
}

impl LinkError {
    /// True if the chiller answered but the frame was damaged in transit
    pub fn is_checksum_mismatch(&self) -> bool {
        matches!(self, LinkError::Parse(ParseError::ChecksumMismatch { .. }))
    }
}
