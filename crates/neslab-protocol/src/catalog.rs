//! Command catalog
//!
//! Every command the chiller understands, keyed by name. Each entry carries the
//! description from the ThermoFlex manual and the byte template that follows
//! the address bytes in a frame: the command code, the number of data bytes,
//! and the data bytes themselves. Data bytes supplied by the caller are
//! represented by [`Slot::D1`] and [`Slot::D2`].

use crate::error::BuildError;

/// One byte position in a command template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Literal byte
    Byte(u8),
    /// First caller-supplied data byte
    D1,
    /// Second caller-supplied data byte
    D2,
}

impl Slot {
    /// Placeholder name, or `None` for literal bytes
    pub fn placeholder(&self) -> Option<&'static str> {
        match self {
            Slot::Byte(_) => None,
            Slot::D1 => Some("d1"),
            Slot::D2 => Some("d2"),
        }
    }
}

/// Shape of the response the chiller sends back for a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResponseKind {
    /// Protocol version acknowledgment
    Ack,
    /// Four status bytes, one condition code each
    Status,
    /// Qualifier byte followed by a scaled integer
    Analog,
    /// Payload without a generic decoding (text, echoed bytes)
    Raw,
}

/// A catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    /// Command name (e.g. `req_setp1`)
    pub name: &'static str,
    /// Human readable description
    pub description: &'static str,
    /// Bytes following the address, with data placeholders
    pub template: &'static [Slot],
}

impl CommandSpec {
    /// Look up a command by name
    pub fn lookup(name: &str) -> Result<&'static CommandSpec, BuildError> {
        COMMANDS
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| BuildError::UnknownCommand(name.to_string()))
    }

    /// All catalog entries, in manual order
    pub fn all() -> &'static [CommandSpec] {
        COMMANDS
    }

    /// Command code byte (first template byte)
    pub fn code(&self) -> u8 {
        match self.template.first() {
            Some(Slot::Byte(b)) => *b,
            _ => 0,
        }
    }

    /// Names of the placeholders this command needs, in template order
    pub fn placeholders(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.template.iter().filter_map(Slot::placeholder)
    }

    /// Response shape, derived from the naming convention of the manual
    pub fn response_kind(&self) -> ResponseKind {
        match self.name {
            "req_ack" => ResponseKind::Ack,
            "req_status" => ResponseKind::Status,
            "req_sw_ver" | "req_display_msg" | "set_keystroke" | "set_onoff_array" => {
                ResponseKind::Raw
            }
            _ => ResponseKind::Analog,
        }
    }
}

/// Front panel keys accepted by `set_keystroke`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Keystroke {
    Null = 0x00,
    Enter = 0x01,
    UpYes = 0x02,
    DownNo = 0x03,
    Esc = 0x04,
    OnOff = 0x05,
    Left = 0x06,
    Right = 0x07,
}

impl Keystroke {
    /// Every key, in code order
    pub const ALL: [Keystroke; 8] = [
        Keystroke::Null,
        Keystroke::Enter,
        Keystroke::UpYes,
        Keystroke::DownNo,
        Keystroke::Esc,
        Keystroke::OnOff,
        Keystroke::Left,
        Keystroke::Right,
    ];

    /// Label used in the manual
    pub fn name(&self) -> &'static str {
        match self {
            Keystroke::Null => "NULL",
            Keystroke::Enter => "ENTER",
            Keystroke::UpYes => "UP_YES",
            Keystroke::DownNo => "DOWN_NO",
            Keystroke::Esc => "ESC",
            Keystroke::OnOff => "ON/OFF",
            Keystroke::Left => "LEFT",
            Keystroke::Right => "RIGHT",
        }
    }

    /// Parse a manual label, ignoring case
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(name))
    }
}

/// `set_onoff_array` data byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OnOff {
    Off = 0x00,
    On = 0x01,
    NoChange = 0x02,
}

use Slot::{Byte, D1, D2};

#[rustfmt::skip]
static COMMANDS: &[CommandSpec] = &[
    // Request status
    CommandSpec { name: "req_ack", description: "Protocol version v1=0; v2=1", template: &[Byte(0x00), Byte(0x00)] },
    CommandSpec { name: "req_sw_ver", description: "Controller SW version", template: &[Byte(0x02), Byte(0x01), D1] },
    CommandSpec { name: "req_display_msg", description: "Display message in ASCII", template: &[Byte(0x02), Byte(0x00)] },
    CommandSpec { name: "req_status", description: "Display message in ASCII", template: &[Byte(0x02), Byte(0x00)] },
    // Request measurements
    CommandSpec { name: "req_flow1", description: "Process Fluid Flow", template: &[Byte(0x10), Byte(0x00)] },
    CommandSpec { name: "req_temp1", description: "Process Fluid Supply Temperature (RTD1)", template: &[Byte(0x20), Byte(0x00)] },
    CommandSpec { name: "req_temp2", description: "Process Fluid Return Temperature (RTD2)", template: &[Byte(0x21), Byte(0x00)] },
    CommandSpec { name: "req_temp4", description: "Entering Air/Facility Water (RTD4)", template: &[Byte(0x23), Byte(0x00)] },
    CommandSpec { name: "req_temp7", description: "ThermoFlex 2500 Air-cooled Fan Speed", template: &[Byte(0x26), Byte(0x00)] },
    CommandSpec { name: "req_analog1", description: "Process Fluid Supply Pressure (P2)", template: &[Byte(0x28), Byte(0x00)] },
    CommandSpec { name: "req_analog2", description: "Refrigeration Suction Pressure (P5)", template: &[Byte(0x29), Byte(0x00)] },
    CommandSpec { name: "req_analog3", description: "Process Fluid Return Pressure (P1)", template: &[Byte(0x2A), Byte(0x00)] },
    CommandSpec { name: "req_analog4", description: "Condensing Pressure (P6)", template: &[Byte(0x2B), Byte(0x00)] },
    CommandSpec { name: "req_analog5", description: "Facility Inlet Pressure (P7)", template: &[Byte(0x1C), Byte(0x00)] },
    CommandSpec { name: "req_analog6", description: "Facility Outlet Pressure (P8)", template: &[Byte(0x1D), Byte(0x00)] },
    CommandSpec { name: "req_analog7", description: "Analog Level (LEV4)", template: &[Byte(0x1E), Byte(0x00)] },
    CommandSpec { name: "req_analog9", description: "+5V Sense", template: &[Byte(0x2F), Byte(0x00)] },
    CommandSpec { name: "req_remote_rtd", description: "Remote Temperature from Optional Analog Board", template: &[Byte(0x1B), Byte(0x00)] },
    CommandSpec { name: "req_res1", description: "Process Fluid Resistivity", template: &[Byte(0x2C), Byte(0x00)] },
    // Request low alarm values
    CommandSpec { name: "req_lo_flow1", description: "Process Warning", template: &[Byte(0x30), Byte(0x00)] },
    CommandSpec { name: "req_lo_flow3", description: "Process Fault", template: &[Byte(0x32), Byte(0x00)] },
    CommandSpec { name: "req_lo_analog1", description: "Pressure Process Supply Warning", template: &[Byte(0x48), Byte(0x00)] },
    CommandSpec { name: "req_lo_analog2", description: "Pressure Process Supply Fault", template: &[Byte(0x49), Byte(0x00)] },
    CommandSpec { name: "req_lo_analog7", description: "Level Warning", template: &[Byte(0x3E), Byte(0x00)] },
    CommandSpec { name: "req_lo_analog8", description: "Level Fault", template: &[Byte(0x3F), Byte(0x00)] },
    CommandSpec { name: "req_lo_temp1", description: "Process Warning", template: &[Byte(0x40), Byte(0x00)] },
    CommandSpec { name: "req_lo_temp2", description: "Process Fault", template: &[Byte(0x41), Byte(0x00)] },
    CommandSpec { name: "req_autorefill_on", description: "Auto Refill ON Setting", template: &[Byte(0x45), Byte(0x00)] },
    CommandSpec { name: "req_lo_res1", description: "Process Warning", template: &[Byte(0x4C), Byte(0x00)] },
    // Request high alarm values
    CommandSpec { name: "req_high_flow1", description: "Process Warning", template: &[Byte(0x50), Byte(0x00)] },
    // Shares 0x32 with req_lo_flow3.
    CommandSpec { name: "req_high_flow3", description: "Process Fault", template: &[Byte(0x32), Byte(0x00)] },
    CommandSpec { name: "req_high_temp1", description: "Process Warning", template: &[Byte(0x60), Byte(0x00)] },
    CommandSpec { name: "req_high_temp2", description: "Process Fault", template: &[Byte(0x61), Byte(0x00)] },
    CommandSpec { name: "req_high_analog1", description: "Pressure Process Supply Warning", template: &[Byte(0x68), Byte(0x00)] },
    CommandSpec { name: "req_high_analog2", description: "Pressure Process Supply Fault", template: &[Byte(0x69), Byte(0x00)] },
    CommandSpec { name: "req_high_analog7", description: "Level Warning", template: &[Byte(0x5E), Byte(0x00)] },
    CommandSpec { name: "req_high_analog8", description: "Level Fault", template: &[Byte(0x5F), Byte(0x00)] },
    CommandSpec { name: "req_autorefill_off", description: "Auto Refill OFF Setting", template: &[Byte(0x65), Byte(0x00)] },
    CommandSpec { name: "req_high_res1", description: "Process Warning", template: &[Byte(0x6C), Byte(0x00)] },
    // Request PID settings
    CommandSpec { name: "req_setp1", description: "Process Fluid Setpoint", template: &[Byte(0x70), Byte(0x00)] },
    CommandSpec { name: "req_cool_p", description: "P", template: &[Byte(0x74), Byte(0x00)] },
    CommandSpec { name: "req_cool_i", description: "I", template: &[Byte(0x75), Byte(0x00)] },
    CommandSpec { name: "req_cool_d", description: "D", template: &[Byte(0x76), Byte(0x00)] },
    // Set status settings
    CommandSpec { name: "set_keystroke", description: "Set Keystroke", template: &[Byte(0x80), Byte(0x01), D1] },
    CommandSpec { name: "set_onoff_array", description: "Set ON/OFF array", template: &[Byte(0x81), Byte(0x01), D1] },
    // Set low alarm values
    CommandSpec { name: "set_lo_flow1", description: "Process Warning", template: &[Byte(0xB0), Byte(0x02), D1, D2] },
    CommandSpec { name: "set_lo_flow3", description: "Process Fault", template: &[Byte(0xB2), Byte(0x02), D1, D2] },
    CommandSpec { name: "set_lo_temp1", description: "Process Warning", template: &[Byte(0xC0), Byte(0x02), D1, D2] },
    CommandSpec { name: "set_lo_temp2", description: "Process Fault", template: &[Byte(0xC1), Byte(0x02), D1, D2] },
    CommandSpec { name: "set_lo_analog1", description: "Pressure Process Supply Warning", template: &[Byte(0xC8), Byte(0x02), D1, D2] },
    CommandSpec { name: "set_lo_analog2", description: "Pressure Process Supply Fault", template: &[Byte(0xC9), Byte(0x02), D1, D2] },
    CommandSpec { name: "set_lo_analog7", description: "Level Warning", template: &[Byte(0xBE), Byte(0x02), D1, D2] },
    CommandSpec { name: "set_lo_analog8", description: "Level Fault", template: &[Byte(0xBF), Byte(0x02), D1, D2] },
    CommandSpec { name: "set_autorefill_on", description: "When level % drops below this, turn on auto refill", template: &[Byte(0xC5), Byte(0x02), D1, D2] },
    CommandSpec { name: "set_lo_res1", description: "Process Warning", template: &[Byte(0xCC), Byte(0x02), D1, D2] },
    // Set high alarm values
    CommandSpec { name: "set_hi_flow1", description: "Process Warning", template: &[Byte(0xD0), Byte(0x02), D1, D2] },
    CommandSpec { name: "set_hi_flow3", description: "Process Fault", template: &[Byte(0xD2), Byte(0x02), D1, D2] },
    CommandSpec { name: "set_hi_temp1", description: "Process Warning", template: &[Byte(0xE0), Byte(0x02), D1, D2] },
    CommandSpec { name: "set_hi_temp2", description: "Process Fault", template: &[Byte(0xE1), Byte(0x02), D1, D2] },
    CommandSpec { name: "set_hi_analog1", description: "Pressure Process Supply Warning", template: &[Byte(0xE8), Byte(0x02), D1, D2] },
    CommandSpec { name: "set_hi_analog2", description: "Pressure Process Supply Fault", template: &[Byte(0xE9), Byte(0x02), D1, D2] },
    CommandSpec { name: "set_hi_analog7", description: "Level Warning", template: &[Byte(0xDE), Byte(0x02), D1, D2] },
    CommandSpec { name: "set_hi_analog8", description: "Level Fault", template: &[Byte(0xDF), Byte(0x02), D1, D2] },
    CommandSpec { name: "set_hi_res1", description: "Process Warning", template: &[Byte(0xEC), Byte(0x02), D1, D2] },
    // Set PID settings
    CommandSpec { name: "set_setp1", description: "Process Fluid Setpoint", template: &[Byte(0xF0), Byte(0x02), D1, D2] },
    CommandSpec { name: "set_cool_p", description: "Cool P Term", template: &[Byte(0xF4), Byte(0x02), D1, D2] },
    CommandSpec { name: "set_cool_i", description: "Cool I Term", template: &[Byte(0xF5), Byte(0x02), D1, D2] },
    CommandSpec { name: "set_cool_d", description: "Cool D Term", template: &[Byte(0xF6), Byte(0x02), D1, D2] },
];
