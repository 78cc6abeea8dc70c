//! Error types for NESLAB frame building and response parsing

use thiserror::Error;

/// Errors that can occur while building an outgoing frame
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// Command name is not in the catalog
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// A template placeholder was left without a value
    #[error("command {command} requires parameter {param}")]
    MissingParameter {
        command: &'static str,
        param: &'static str,
    },
}

/// Error reported by the chiller in an error response frame
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{description} (error code: {subcode})")]
pub struct DeviceError {
    /// Error class byte (1 = bad command, 2 = rejected value, 3 = no response)
    pub code: u8,
    /// Numeric sub-code reported alongside the error class
    pub subcode: u8,
    /// Human readable description of `code`
    pub description: &'static str,
}

/// Errors that can occur while parsing a response frame
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Frame is shorter than the smallest valid response
    #[error("frame too short: need at least {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },

    /// Checksum mismatch
    #[error("checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// The chiller rejected the command
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// Frame length disagrees with its byte-count field
    #[error("frame length {actual} does not match byte count (expected {expected})")]
    UnexpectedLength { expected: usize, actual: usize },

    /// Qualifier byte carries a unit code outside the unit table
    #[error("unknown unit code: {0}")]
    UnknownUnit(u8),

    /// Value integer is neither 2 nor 4 bytes wide
    #[error("unsupported value width: {0} bytes")]
    UnsupportedWidth(usize),
}
