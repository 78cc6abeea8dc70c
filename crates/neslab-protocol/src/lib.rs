//! NESLAB Protocol Library
//!
//! This crate provides frame encoding and response decoding for the serial
//! protocol spoken by Thermo Scientific NESLAB ThermoFlex recirculating
//! chillers, over RS-232 (point-to-point) or RS-485 (multi-drop).
//!
//! # Architecture
//!
//! - [`catalog`]: every command the chiller understands, with its byte template
//! - [`checksum`]: the one-byte inverted-sum checksum
//! - [`frame`]: building outgoing frames and pulling incoming frames out of a byte stream
//! - [`response`]: checksum and device-error checks, ack and analog decoding
//! - [`value`]: qualifier bytes, units and scaled readings
//! - [`status`]: alarm and fault conditions from the status bytes
//!
//! Nothing here performs I/O; every function is pure and safe to call from
//! any thread.
//!
//! # Example
//!
//! ```rust
//! use neslab_protocol::{build, decode_analog, Params, Unit};
//!
//! // Ask for the process fluid setpoint
//! let frame = build("req_setp1", &Params::new()).unwrap();
//! assert_eq!(frame, [0xCA, 0x00, 0x01, 0x70, 0x00, 0x8E]);
//!
//! // The chiller answers 20.0 °C
//! let reading = decode_analog(&[0xCA, 0x00, 0x01, 0x70, 0x03, 0x11, 0x00, 0xC8, 0xB2]).unwrap();
//! assert_eq!(reading.unit(), Unit::Celsius);
//! assert_eq!(reading.value(), 20.0);
//! ```

pub mod catalog;
pub mod checksum;
pub mod error;
pub mod frame;
pub mod response;
pub mod status;
pub mod value;

pub use catalog::{CommandSpec, Keystroke, OnOff, ResponseKind, Slot};
pub use checksum::{checksum, verify};
pub use error::{BuildError, DeviceError, ParseError};
pub use frame::{build, Address, FrameBuilder, FrameDecoder, Interface, Params};
pub use response::{classify_error, decode_analog, decode_status, read_ack, Response};
pub use status::{StatusByte, StatusReport};
pub use value::{AnalogReading, Qualifier, Unit};
