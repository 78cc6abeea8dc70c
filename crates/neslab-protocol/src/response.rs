//! Response validation and decoding
//!
//! Every parser here checks the trailing checksum before looking at the
//! payload, and error frames (command `0F 02`) are reported as
//! [`DeviceError`]s rather than decoded as data.

use crate::catalog::ResponseKind;
use crate::checksum::{checksum, verify};
use crate::error::{DeviceError, ParseError};
use crate::frame::MIN_FRAME_LEN;
use crate::status::StatusReport;
use crate::value::{AnalogReading, Qualifier};

/// Command field of an error response
pub const ERROR_COMMAND: [u8; 2] = [0x0F, 0x02];
/// Command, count and data of an ack reporting protocol version 0
pub const ACK_PAYLOAD: [u8; 4] = [0x00, 0x02, 0x00, 0x01];

/// Description of an error class byte from an error response
pub fn error_description(code: u8) -> &'static str {
    match code {
        0x01 => "unrecognized command",
        0x02 => "value rejected, old setting kept",
        0x03 => "no response",
        _ => "unknown error",
    }
}

/// Verify the checksum, reporting the expected and received bytes on failure
pub fn check_checksum(frame: &[u8]) -> Result<(), ParseError> {
    if frame.len() < 3 {
        return Err(ParseError::TooShort {
            needed: 3,
            actual: frame.len(),
        });
    }
    if verify(frame) {
        return Ok(());
    }
    Err(ParseError::ChecksumMismatch {
        expected: checksum(&frame[1..frame.len() - 1]),
        actual: frame[frame.len() - 1],
    })
}

/// Reject frames with a bad checksum and frames reporting a device error
///
/// `Ok(())` means the frame is intact and is not an error response.
pub fn classify_error(frame: &[u8]) -> Result<(), ParseError> {
    check_checksum(frame)?;

    if frame.get(3..5) != Some(&ERROR_COMMAND[..]) {
        return Ok(());
    }

    match (frame.get(5), frame.get(6)) {
        (Some(&code), Some(&subcode)) if frame.len() > 7 => Err(DeviceError {
            code,
            subcode,
            description: error_description(code),
        }
        .into()),
        _ => Err(ParseError::TooShort {
            needed: 8,
            actual: frame.len(),
        }),
    }
}

/// True if the frame is an intact ack for protocol version 0
pub fn read_ack(frame: &[u8]) -> bool {
    verify(frame) && frame.get(3..7) == Some(&ACK_PAYLOAD[..])
}

/// Data bytes of an intact, non-error response whose length matches its count
pub fn payload(frame: &[u8]) -> Result<&[u8], ParseError> {
    classify_error(frame)?;
    if frame.len() < MIN_FRAME_LEN {
        return Err(ParseError::TooShort {
            needed: MIN_FRAME_LEN,
            actual: frame.len(),
        });
    }
    let expected = MIN_FRAME_LEN + frame[4] as usize;
    if frame.len() != expected {
        return Err(ParseError::UnexpectedLength {
            expected,
            actual: frame.len(),
        });
    }
    Ok(&frame[5..frame.len() - 1])
}

/// Decode a qualified analog value
///
/// The integer follows the qualifier most significant byte first: in
/// `70 03 11 00 C8` the value is `0x00C8` = 200.
pub fn decode_analog(frame: &[u8]) -> Result<AnalogReading, ParseError> {
    let data = payload(frame)?;
    let (&qualifier, digits) = data.split_first().ok_or(ParseError::UnexpectedLength {
        expected: MIN_FRAME_LEN + 3,
        actual: frame.len(),
    })?;
    if digits.len() != 2 && digits.len() != 4 {
        return Err(ParseError::UnsupportedWidth(digits.len()));
    }

    let qualifier = Qualifier::from_byte(qualifier)?;
    let raw = digits.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32);

    Ok(AnalogReading {
        byte_count: frame[4],
        qualifier,
        raw,
    })
}

/// Decode the four status bytes of a status response
///
/// The payload must be exactly d1 through d4.
pub fn decode_status(frame: &[u8]) -> Result<StatusReport, ParseError> {
    let data = payload(frame)?;
    let bytes: [u8; 4] = data
        .try_into()
        .map_err(|_| ParseError::UnexpectedLength {
            expected: MIN_FRAME_LEN + 4,
            actual: frame.len(),
        })?;
    Ok(StatusReport::from_bytes(bytes))
}

/// A response decoded according to the shape its command expects
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Response {
    /// Whether the ack reported protocol version 0
    Ack(bool),
    Status(StatusReport),
    Analog(AnalogReading),
    /// Data bytes without further decoding
    Raw(Vec<u8>),
}

impl Response {
    /// Validate and decode `frame` as a response of the given shape
    pub fn parse(kind: ResponseKind, frame: &[u8]) -> Result<Self, ParseError> {
        match kind {
            ResponseKind::Ack => {
                classify_error(frame)?;
                Ok(Response::Ack(read_ack(frame)))
            }
            ResponseKind::Status => decode_status(frame).map(Response::Status),
            ResponseKind::Analog => decode_analog(frame).map(Response::Analog),
            ResponseKind::Raw => payload(frame).map(|d| Response::Raw(d.to_vec())),
        }
    }
}
