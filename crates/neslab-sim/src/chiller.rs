//! Virtual chiller simulation
//!
//! Provides a simulated ThermoFlex controller that answers request frames
//! with protocol-accurate response frames.

use std::collections::BTreeMap;
use std::time::Instant;

use neslab_protocol::{
    checksum, verify, Address, CommandSpec, Interface, Keystroke, Qualifier, StatusReport, Unit,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Error class sent back for commands the controller does not know
const BAD_COMMAND: u8 = 0x01;

/// A value the controller can report, and possibly accept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register {
    pub qualifier: Qualifier,
    pub raw: u16,
}

/// A simulated chiller that answers protocol frames
#[derive(Debug)]
pub struct VirtualChiller {
    /// Unique identifier for this virtual chiller
    id: String,
    /// Device address the chiller answers to
    address: Address,
    /// Reportable values keyed by their request command byte
    registers: BTreeMap<u8, Register>,
    /// Unit running (on/off array)
    running: bool,
    /// Status bytes d1..d4
    status: [u8; 4],
    /// Last key pressed through `set_keystroke`
    last_key: Option<Keystroke>,
    /// Last state change timestamp
    last_change: Instant,
}

/// Configuration for creating a virtual chiller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualChillerConfig {
    /// Display name/identifier
    pub id: String,
    /// Device address
    pub address: Address,
    /// Initial setpoint in tenths of a degree Celsius
    pub setpoint_tenths: u16,
    /// Whether the unit starts running
    pub running: bool,
}

impl Default for VirtualChillerConfig {
    fn default() -> Self {
        Self {
            id: "Virtual ThermoFlex".to_string(),
            address: Address::default(),
            setpoint_tenths: 200, // 20.0 °C
            running: true,
        }
    }
}

impl VirtualChiller {
    /// Create a new virtual chiller with default settings
    pub fn new(id: impl Into<String>) -> Self {
        Self::from_config(VirtualChillerConfig {
            id: id.into(),
            ..Default::default()
        })
    }

    /// Create a virtual chiller from configuration
    pub fn from_config(config: VirtualChillerConfig) -> Self {
        let mut registers: BTreeMap<u8, Register> = DEFAULT_REGISTERS
            .iter()
            .map(|&(code, unit, exponent, raw)| {
                let qualifier = Qualifier::new(unit, exponent);
                (code, Register { qualifier, raw })
            })
            .collect();
        if let Some(setpoint) = registers.get_mut(&SETPOINT) {
            setpoint.raw = config.setpoint_tenths;
        }

        Self {
            id: config.id,
            address: config.address,
            registers,
            running: config.running,
            status: if config.running { [0xB0, 0, 0, 0] } else { [0; 4] },
            last_key: None,
            last_change: Instant::now(),
        }
    }

    /// Get the chiller's unique identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn last_key(&self) -> Option<Keystroke> {
        self.last_key
    }

    /// Get the time of last state change
    pub fn last_change(&self) -> Instant {
        self.last_change
    }

    /// Raw value behind a catalog request or set command
    pub fn register(&self, command: &str) -> Option<Register> {
        let spec = CommandSpec::lookup(command).ok()?;
        self.registers.get(&(spec.code() & 0x7F)).copied()
    }

    /// Overwrite the raw value behind a catalog command, e.g. to simulate a
    /// changing temperature
    pub fn set_register(&mut self, command: &str, raw: u16) -> bool {
        let Ok(spec) = CommandSpec::lookup(command) else {
            return false;
        };
        match self.registers.get_mut(&(spec.code() & 0x7F)) {
            Some(reg) => {
                reg.raw = raw;
                self.last_change = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Replace the four status bytes
    pub fn set_status(&mut self, status: [u8; 4]) {
        self.status = status;
        self.last_change = Instant::now();
    }

    pub fn status(&self) -> StatusReport {
        StatusReport::from_bytes(self.status)
    }

    /// Answer one request frame
    ///
    /// Returns `None` when the controller would stay silent: bad checksum,
    /// unknown lead byte, or a frame addressed to another device.
    pub fn handle_frame(&mut self, frame: &[u8]) -> Option<Vec<u8>> {
        if !verify(frame) || frame.len() < 6 {
            warn!("{} ignoring corrupt frame: {:02X?}", self.id, frame);
            return None;
        }
        let interface = Interface::from_lead_byte(frame[0])?;
        if Address::new(frame[1], frame[2]) != self.address {
            debug!("{} ignoring frame for another address", self.id);
            return None;
        }

        let command = frame[3];
        let data = &frame[5..frame.len() - 1];
        let payload = self.respond(command, data);
        Some(self.encode(interface, &payload))
    }

    fn respond(&mut self, command: u8, data: &[u8]) -> Vec<u8> {
        match (command, data) {
            // req_ack
            (0x00, []) => vec![0x00, 0x02, 0x00, 0x01],
            // req_display_msg / req_status
            (0x02, []) => {
                let mut payload = vec![0x02, 0x04];
                payload.extend(self.status);
                payload
            }
            // req_sw_ver
            (0x02, [_]) => vec![0x02, 0x02, 0x01, 0x00],
            (0x80, &[key]) => {
                self.last_key = Keystroke::ALL.into_iter().find(|k| *k as u8 == key);
                if self.last_key == Some(Keystroke::OnOff) {
                    self.set_running(!self.running);
                }
                vec![0x80, 0x01, key]
            }
            (0x81, &[state]) => {
                match state {
                    0x00 => self.set_running(false),
                    0x01 => self.set_running(true),
                    _ => {}
                }
                vec![0x81, 0x01, self.running as u8]
            }
            (code, []) if self.registers.contains_key(&code) => self.report(code),
            (code, &[hi, lo]) if code & 0x80 != 0 => {
                let target = code & 0x7F;
                match self.registers.get_mut(&target) {
                    Some(reg) => {
                        reg.raw = u16::from_be_bytes([hi, lo]);
                        self.last_change = Instant::now();
                        debug!("{} register 0x{:02X} set to {}", self.id, target, reg.raw);
                        let mut payload = self.report(target);
                        payload[0] = code;
                        payload
                    }
                    None => vec![0x0F, 0x02, BAD_COMMAND, code],
                }
            }
            _ => {
                debug!("{} rejecting command 0x{:02X}", self.id, command);
                vec![0x0F, 0x02, BAD_COMMAND, command]
            }
        }
    }

    fn report(&self, code: u8) -> Vec<u8> {
        let reg = self.registers[&code];
        let [hi, lo] = reg.raw.to_be_bytes();
        vec![code, 0x03, reg.qualifier.to_byte(), hi, lo]
    }

    fn set_running(&mut self, running: bool) {
        if self.running != running {
            self.running = running;
            self.status[0] = if running { 0xB0 } else { 0x00 };
            self.last_change = Instant::now();
        }
    }

    fn encode(&self, interface: Interface, payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![interface.lead_byte(), self.address.msb, self.address.lsb];
        frame.extend_from_slice(payload);
        frame.push(checksum(&frame[1..]));
        frame
    }

    /// Get a summary of current state
    pub fn state_summary(&self) -> String {
        let tenths = |code: u8| self.registers.get(&code).map_or(0.0, |r| r.raw as f64 / 10.0);
        let (setpoint, supply) = (tenths(SETPOINT), tenths(SUPPLY_TEMP));
        format!(
            "{} - setpoint {:.1} °C, supply {:.1} °C {}",
            self.id,
            setpoint,
            supply,
            if self.running { "[RUN]" } else { "[OFF]" }
        )
    }
}

const SETPOINT: u8 = 0x70;
const SUPPLY_TEMP: u8 = 0x20;

/// (request code, unit, decimal places, initial raw value)
#[rustfmt::skip]
static DEFAULT_REGISTERS: &[(u8, Unit, u8, u16)] = &[
    // Measurements
    (0x10, Unit::LitersPerMinute, 1, 125),
    (0x20, Unit::Celsius, 1, 201),
    (0x21, Unit::Celsius, 1, 215),
    (0x23, Unit::Celsius, 1, 230),
    (0x26, Unit::Percent, 0, 60),
    (0x28, Unit::Psi, 1, 452),
    (0x29, Unit::Psi, 1, 380),
    (0x2A, Unit::Psi, 1, 120),
    (0x2B, Unit::Psi, 1, 1850),
    (0x1C, Unit::Psi, 1, 400),
    (0x1D, Unit::Psi, 1, 300),
    (0x1E, Unit::Percent, 0, 85),
    (0x2F, Unit::Volts, 2, 502),
    (0x1B, Unit::Celsius, 1, 198),
    (0x2C, Unit::MegaohmCm, 1, 12),
    // Low alarms
    (0x30, Unit::LitersPerMinute, 1, 20),
    (0x32, Unit::LitersPerMinute, 1, 10),
    (0x48, Unit::Psi, 1, 50),
    (0x49, Unit::Psi, 1, 20),
    (0x3E, Unit::Percent, 0, 30),
    (0x3F, Unit::Percent, 0, 10),
    (0x40, Unit::Celsius, 1, 50),
    (0x41, Unit::Celsius, 1, 20),
    (0x45, Unit::Percent, 0, 60),
    (0x4C, Unit::MegaohmCm, 1, 5),
    // High alarms
    (0x50, Unit::LitersPerMinute, 1, 300),
    (0x52, Unit::LitersPerMinute, 1, 350),
    (0x60, Unit::Celsius, 1, 350),
    (0x61, Unit::Celsius, 1, 400),
    (0x68, Unit::Psi, 1, 800),
    (0x69, Unit::Psi, 1, 900),
    (0x5E, Unit::Percent, 0, 95),
    (0x5F, Unit::Percent, 0, 100),
    (0x65, Unit::Percent, 0, 90),
    (0x6C, Unit::MegaohmCm, 1, 180),
    // PID
    (0x70, Unit::Celsius, 1, 200),
    (0x74, Unit::None, 1, 6),
    (0x75, Unit::None, 1, 6),
    (0x76, Unit::None, 1, 0),
];

#[cfg(test)]
mod tests {
    use super::*;
    use neslab_protocol::{
        build, decode_analog, decode_status, read_ack, FrameBuilder, Params, ParseError,
    };

    #[test]
    fn test_create_virtual_chiller() {
        let chiller = VirtualChiller::new("Test Chiller");
        assert_eq!(chiller.id(), "Test Chiller");
        assert!(chiller.running());
        assert_eq!(chiller.register("req_setp1").unwrap().raw, 200);
    }

    #[test]
    fn test_answers_manual_example() {
        let mut chiller = VirtualChiller::new("Test");
        let request = build("req_setp1", &Params::new()).unwrap();
        let response = chiller.handle_frame(&request).unwrap();
        assert_eq!(
            response,
            vec![0xCA, 0x00, 0x01, 0x70, 0x03, 0x11, 0x00, 0xC8, 0xB2]
        );
    }

    #[test]
    fn test_set_echoes_new_value() {
        let mut chiller = VirtualChiller::new("Test");
        let request = build("set_setp1", &Params::value(250)).unwrap();
        let response = chiller.handle_frame(&request).unwrap();
        assert_eq!(
            response,
            vec![0xCA, 0x00, 0x01, 0xF0, 0x03, 0x11, 0x00, 0xFA, 0x00]
        );
        assert_eq!(chiller.register("req_setp1").unwrap().raw, 250);
    }

    #[test]
    fn test_ack() {
        let mut chiller = VirtualChiller::new("Test");
        let response = chiller
            .handle_frame(&build("req_ack", &Params::new()).unwrap())
            .unwrap();
        assert!(read_ack(&response));
    }

    #[test]
    fn test_bad_checksum_is_ignored() {
        let mut chiller = VirtualChiller::new("Test");
        assert!(chiller
            .handle_frame(&[0xCA, 0x00, 0x01, 0x70, 0x00, 0x8F])
            .is_none());
    }

    #[test]
    fn test_other_address_is_ignored() {
        let mut chiller = VirtualChiller::new("Test");
        let frame = FrameBuilder::new()
            .with_address(Address::new(0x00, 0x02))
            .build("req_ack", &Params::new())
            .unwrap();
        assert!(chiller.handle_frame(&frame).is_none());
    }

    #[test]
    fn test_multi_drop_lead_is_echoed() {
        let mut chiller = VirtualChiller::new("Test");
        let frame = FrameBuilder::new()
            .with_interface(Interface::MultiDrop)
            .build("req_temp1", &Params::new())
            .unwrap();
        let response = chiller.handle_frame(&frame).unwrap();
        assert_eq!(response[0], 0xCC);
        assert_eq!(decode_analog(&response).unwrap().raw, 201);
    }

    #[test]
    fn test_unknown_command_gets_error_frame() {
        let mut chiller = VirtualChiller::new("Test");
        // Heating setpoint request; this unit has no heater
        let mut frame = vec![0xCA, 0x00, 0x01, 0x71, 0x00];
        frame.push(checksum(&frame[1..]));
        let response = chiller.handle_frame(&frame).unwrap();
        match decode_analog(&response) {
            Err(ParseError::Device(e)) => {
                assert_eq!(e.code, 0x01);
                assert_eq!(e.subcode, 0x71);
            }
            other => panic!("expected device error, got {:?}", other),
        }
    }

    #[test]
    fn test_status_and_power() {
        let mut chiller = VirtualChiller::new("Test");
        let status = chiller
            .handle_frame(&build("req_status", &Params::new()).unwrap())
            .unwrap();
        let report = decode_status(&status).unwrap();
        assert_eq!(report.entries[0].condition, Some("Chiller Running"));

        let off = build("set_onoff_array", &Params::new().d1(0x00)).unwrap();
        let response = chiller.handle_frame(&off).unwrap();
        assert_eq!(&response[3..6], &[0x81, 0x01, 0x00]);
        assert!(!chiller.running());
    }

    #[test]
    fn test_keystroke_toggles_power() {
        let mut chiller = VirtualChiller::new("Test");
        let press = build("set_keystroke", &Params::new().d1(Keystroke::OnOff as u8)).unwrap();
        chiller.handle_frame(&press).unwrap();
        assert_eq!(chiller.last_key(), Some(Keystroke::OnOff));
        assert!(!chiller.running());
    }

    #[test]
    fn test_every_catalog_command_gets_an_answer() {
        let params = Params::new().d1(0x00).d2(0x10);
        for spec in CommandSpec::all() {
            let mut chiller = VirtualChiller::new("Test");
            let frame = FrameBuilder::new().build_spec(spec, &params).unwrap();
            let response = chiller.handle_frame(&frame);
            assert!(
                response.as_deref().is_some_and(verify),
                "no valid answer for {}",
                spec.name
            );
        }
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn answer_verifies_and_echoes_command(
                index in 0..CommandSpec::all().len(),
                d1 in any::<u8>(),
                d2 in any::<u8>(),
            ) {
                let spec = &CommandSpec::all()[index];
                let frame = build(spec.name, &Params::new().d1(d1).d2(d2)).unwrap();
                let mut chiller = VirtualChiller::new("Prop");

                let response = chiller.handle_frame(&frame).unwrap();
                prop_assert!(verify(&response));
                prop_assert!(response[3] == spec.code() || response[3] == 0x0F);
            }

            #[test]
            fn corrupted_frames_get_no_answer(
                index in 0..CommandSpec::all().len(),
                flip in 1u8..=255,
            ) {
                let spec = &CommandSpec::all()[index];
                let mut frame = build(spec.name, &Params::value(0x0102)).unwrap();
                let last = frame.len() - 1;
                frame[last] ^= flip;

                let mut chiller = VirtualChiller::new("Prop");
                prop_assert_eq!(chiller.handle_frame(&frame), None);
            }
        }
    }
}
