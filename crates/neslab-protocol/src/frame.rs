//! Frame construction and streaming frame extraction
//!
//! # Frame Format
//! ```text
//! [lead] [addr MSB] [addr LSB] [command] [n] [d1 ... dn] [checksum]
//! ```
//!
//! - `lead`: 0xCA on the RS-232 point-to-point interface, 0xCC on RS-485 multi-drop
//! - `addr`: device address, 0x00 0x01 unless the chiller was configured otherwise
//! - `n`: number of data bytes that follow
//! - `checksum`: see [`crate::checksum`]; covers address through the last data byte
//!
//! Frames are plain byte sequences in both directions.

use crate::catalog::{CommandSpec, Slot};
use crate::checksum::{checksum, verify};
use crate::error::BuildError;

/// Lead byte of the RS-232 point-to-point interface
pub const LEAD_POINT_TO_POINT: u8 = 0xCA;
/// Lead byte of the RS-485 multi-drop interface
pub const LEAD_MULTI_DROP: u8 = 0xCC;

/// Lead + address + command + byte count + checksum
pub const MIN_FRAME_LEN: usize = 6;
/// Largest frame the decoder will wait for
const MAX_FRAME_LEN: usize = 64;

/// Physical interface convention, selected by the lead byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Interface {
    /// RS-232
    #[default]
    PointToPoint,
    /// RS-485
    MultiDrop,
}

impl Interface {
    pub fn lead_byte(&self) -> u8 {
        match self {
            Interface::PointToPoint => LEAD_POINT_TO_POINT,
            Interface::MultiDrop => LEAD_MULTI_DROP,
        }
    }

    pub fn from_lead_byte(byte: u8) -> Option<Self> {
        match byte {
            LEAD_POINT_TO_POINT => Some(Interface::PointToPoint),
            LEAD_MULTI_DROP => Some(Interface::MultiDrop),
            _ => None,
        }
    }

    /// Name used in the manual
    pub fn name(&self) -> &'static str {
        match self {
            Interface::PointToPoint => "RS232",
            Interface::MultiDrop => "RS485",
        }
    }
}

/// Two-byte device address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Address {
    pub msb: u8,
    pub lsb: u8,
}

impl Address {
    pub const fn new(msb: u8, lsb: u8) -> Self {
        Self { msb, lsb }
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::new(0x00, 0x01)
    }
}

/// Data bytes substituted into a command template
///
/// Values the template does not use are ignored; values it does use must be
/// present or building fails with [`BuildError::MissingParameter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Params {
    pub d1: Option<u8>,
    pub d2: Option<u8>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn d1(mut self, byte: u8) -> Self {
        self.d1 = Some(byte);
        self
    }

    pub fn d2(mut self, byte: u8) -> Self {
        self.d2 = Some(byte);
        self
    }

    /// Two-byte integer for the `set_*` commands, most significant byte in `d1`
    pub fn value(raw: u16) -> Self {
        let [hi, lo] = raw.to_be_bytes();
        Self::new().d1(hi).d2(lo)
    }

    fn get(&self, slot: Slot) -> Option<u8> {
        match slot {
            Slot::Byte(b) => Some(b),
            Slot::D1 => self.d1,
            Slot::D2 => self.d2,
        }
    }
}

/// Builds outgoing frames for one interface and device address
///
/// Building is deterministic: the same command and parameters always produce
/// the same bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameBuilder {
    interface: Interface,
    address: Address,
}

impl FrameBuilder {
    /// Builder for the default RS-232 interface and address 0x00 0x01
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interface(mut self, interface: Interface) -> Self {
        self.interface = interface;
        self
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.address = address;
        self
    }

    pub fn interface(&self) -> Interface {
        self.interface
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Build the frame for a named catalog command
    pub fn build(&self, command: &str, params: &Params) -> Result<Vec<u8>, BuildError> {
        let spec = CommandSpec::lookup(command)?;
        self.build_spec(spec, params)
    }

    /// Build the frame for a catalog entry
    pub fn build_spec(&self, spec: &CommandSpec, params: &Params) -> Result<Vec<u8>, BuildError> {
        let mut frame = Vec::with_capacity(spec.template.len() + 4);
        frame.push(self.interface.lead_byte());
        frame.push(self.address.msb);
        frame.push(self.address.lsb);

        for &slot in spec.template {
            let byte = params.get(slot).ok_or(BuildError::MissingParameter {
                command: spec.name,
                param: slot.placeholder().unwrap_or("?"),
            })?;
            frame.push(byte);
        }

        frame.push(checksum(&frame[1..]));
        tracing::trace!("Built {} frame: {:02X?}", spec.name, frame);
        Ok(frame)
    }
}

/// Build a frame with the default interface and address
pub fn build(command: &str, params: &Params) -> Result<Vec<u8>, BuildError> {
    FrameBuilder::new().build(command, params)
}

/// Streaming extractor for incoming frames
///
/// Bytes arrive from the transport in arbitrary chunks. The decoder discards
/// noise before a lead byte and emits the shortest run of at least `6 + n`
/// bytes whose checksum verifies. A response that never verifies stays
/// buffered until [`FrameDecoder::take_partial`] hands it back.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MAX_FRAME_LEN),
        }
    }

    /// Push raw bytes into the decoder's buffer
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to extract the next verified frame
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        loop {
            let lead_pos = self
                .buffer
                .iter()
                .position(|&b| Interface::from_lead_byte(b).is_some());
            match lead_pos {
                Some(0) => {}
                Some(pos) => {
                    tracing::trace!("Discarding {} bytes before lead byte", pos);
                    self.buffer.drain(..pos);
                }
                None => {
                    self.buffer.clear();
                    return None;
                }
            }

            if self.buffer.len() < MIN_FRAME_LEN - 1 {
                return None;
            }

            let min_len = MIN_FRAME_LEN + self.buffer[4] as usize;
            if min_len <= MAX_FRAME_LEN {
                let max_len = self.buffer.len().min(MAX_FRAME_LEN);
                if let Some(len) = (min_len..=max_len).find(|&len| verify(&self.buffer[..len])) {
                    return Some(self.buffer.drain(..len).collect());
                }
                if self.buffer.len() < MAX_FRAME_LEN {
                    return None;
                }
            }

            // No frame can start here; resync on the next lead byte
            tracing::warn!("Dropping unverifiable frame start: {:02X?}", &self.buffer[..5]);
            self.buffer.remove(0);
        }
    }

    /// Bytes buffered so far, if they hold at least a minimal frame
    ///
    /// Used when the peer stops sending: what arrived is returned for parsing
    /// so a corrupt response surfaces as a checksum error.
    pub fn take_partial(&mut self) -> Option<Vec<u8>> {
        if self.buffer.len() >= MIN_FRAME_LEN {
            Some(std::mem::take(&mut self.buffer))
        } else {
            None
        }
    }

    /// Clear the internal buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Number of bytes waiting in the buffer
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_build_request() {
        let frame = build("req_setp1", &Params::new()).unwrap();
        assert_eq!(frame, vec![0xCA, 0x00, 0x01, 0x70, 0x00, 0x8E]);
    }

    #[test]
    fn test_build_set_setpoint() {
        let params = Params::new().d1(0x00).d2(0xFA);
        let frame = build("set_setp1", &params).unwrap();
        assert_eq!(frame, vec![0xCA, 0x00, 0x01, 0xF0, 0x02, 0x00, 0xFA, 0x12]);
        assert_eq!(build("set_setp1", &Params::value(250)).unwrap(), frame);
    }

    #[test]
    fn test_build_multi_drop() {
        let builder = FrameBuilder::new()
            .with_interface(Interface::MultiDrop)
            .with_address(Address::new(0x00, 0x05));
        let frame = builder.build("req_ack", &Params::new()).unwrap();
        assert_eq!(frame[0], 0xCC);
        assert_eq!(&frame[1..3], &[0x00, 0x05]);
        assert!(verify(&frame));
    }

    #[test]
    fn test_build_unknown_command() {
        assert_eq!(
            build("req_nothing", &Params::new()),
            Err(BuildError::UnknownCommand("req_nothing".into()))
        );
    }

    #[test]
    fn test_build_missing_parameter() {
        assert_eq!(
            build("set_setp1", &Params::new().d1(0x00)),
            Err(BuildError::MissingParameter {
                command: "set_setp1",
                param: "d2"
            })
        );
        assert_eq!(
            build("set_keystroke", &Params::new()),
            Err(BuildError::MissingParameter {
                command: "set_keystroke",
                param: "d1"
            })
        );
    }

    #[test]
    fn test_every_command_verifies() {
        let params = Params::new().d1(0x10).d2(0x20);
        for spec in CommandSpec::all() {
            let frame = FrameBuilder::new().build_spec(spec, &params).unwrap();
            assert!(verify(&frame), "checksum failed for {}", spec.name);
        }
    }

    #[test]
    fn test_decoder_split_input() {
        let mut decoder = FrameDecoder::new();
        decoder.push_bytes(&[0xCA, 0x00, 0x01, 0x70]);
        assert!(decoder.next_frame().is_none());
        decoder.push_bytes(&[0x03, 0x11, 0x00, 0xC8]);
        assert!(decoder.next_frame().is_none());
        decoder.push_bytes(&[0xB2]);
        assert_eq!(
            decoder.next_frame().unwrap(),
            vec![0xCA, 0x00, 0x01, 0x70, 0x03, 0x11, 0x00, 0xC8, 0xB2]
        );
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_decoder_skips_noise() {
        let mut decoder = FrameDecoder::new();
        decoder.push_bytes(&[0x00, 0x55, 0xCA, 0x00, 0x01, 0x00, 0x02, 0x00, 0x01, 0xFB]);
        assert_eq!(
            decoder.next_frame().unwrap(),
            vec![0xCA, 0x00, 0x01, 0x00, 0x02, 0x00, 0x01, 0xFB]
        );
    }

    #[test]
    fn test_decoder_error_frame_longer_than_count() {
        // Error responses may carry more bytes than their count field declares
        let frame = [0xCA, 0x00, 0x01, 0x0F, 0x02, 0x01, 0x08, 0x33, 0x96, 0x1B];
        let mut decoder = FrameDecoder::new();
        decoder.push_bytes(&frame);
        assert_eq!(decoder.next_frame().unwrap(), frame.to_vec());
    }

    #[test]
    fn test_decoder_back_to_back() {
        let mut decoder = FrameDecoder::new();
        decoder.push_bytes(&[0xCA, 0x00, 0x01, 0x70, 0x00, 0x8E]);
        decoder.push_bytes(&[0xCA, 0x00, 0x01, 0x00, 0x02, 0x00, 0x01, 0xFB]);
        assert_eq!(decoder.next_frame().unwrap().len(), 6);
        assert_eq!(decoder.next_frame().unwrap().len(), 8);
        assert!(decoder.next_frame().is_none());
    }

    #[test]
    fn test_decoder_take_partial_on_bad_checksum() {
        let mut decoder = FrameDecoder::new();
        decoder.push_bytes(&[0xCA, 0x00, 0x01, 0x00, 0x02, 0x00, 0x01, 0xFA]);
        assert!(decoder.next_frame().is_none());
        assert_eq!(
            decoder.take_partial().unwrap(),
            vec![0xCA, 0x00, 0x01, 0x00, 0x02, 0x00, 0x01, 0xFA]
        );
        assert!(decoder.take_partial().is_none());
    }

    proptest! {
        #[test]
        fn build_is_deterministic(d1: u8, d2: u8, idx in 0usize..68) {
            let spec = &CommandSpec::all()[idx];
            let params = Params::new().d1(d1).d2(d2);
            let first = FrameBuilder::new().build_spec(spec, &params).unwrap();
            let second = FrameBuilder::new().build_spec(spec, &params).unwrap();
            prop_assert!(verify(&first));
            prop_assert_eq!(first, second);
        }

        #[test]
        fn decoder_recovers_built_frames(raw: u16, noise in prop::collection::vec(0u8..0xC0, 0..8)) {
            let frame = build("set_setp1", &Params::value(raw)).unwrap();
            let mut decoder = FrameDecoder::new();
            decoder.push_bytes(&noise);
            decoder.push_bytes(&frame);
            prop_assert_eq!(decoder.next_frame(), Some(frame));
        }
    }
}
