//! Status byte decoding
//!
//! A status response carries four bytes, d1 through d4. Each table below maps
//! a literal byte value to one alarm or fault condition. Whether the chiller
//! can report several conditions in one byte is not documented, so bytes are
//! looked up as whole values rather than tested bit by bit.

use std::fmt;

/// Position of a byte in the status payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StatusByte {
    D1,
    D2,
    D3,
    D4,
}

impl StatusByte {
    pub const ALL: [StatusByte; 4] = [StatusByte::D1, StatusByte::D2, StatusByte::D3, StatusByte::D4];

    fn table(&self) -> &'static [(u8, &'static str)] {
        match self {
            StatusByte::D1 => D1_CONDITIONS,
            StatusByte::D2 => D2_CONDITIONS,
            StatusByte::D3 => D3_CONDITIONS,
            StatusByte::D4 => D4_CONDITIONS,
        }
    }
}

/// Look up the condition reported by one status byte
pub fn decode(position: StatusByte, value: u8) -> Option<&'static str> {
    position
        .table()
        .iter()
        .find(|(code, _)| *code == value)
        .map(|(_, name)| *name)
}

/// One decoded status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StatusEntry {
    pub position: StatusByte,
    pub raw: u8,
    /// `None` when the byte value is not in the table
    pub condition: Option<&'static str>,
}

/// All four decoded status bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StatusReport {
    pub entries: [StatusEntry; 4],
}

impl StatusReport {
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        let entries = StatusByte::ALL.map(|position| {
            let raw = bytes[position as usize];
            StatusEntry {
                position,
                raw,
                condition: decode(position, raw),
            }
        });
        Self { entries }
    }

    /// Conditions that were recognized
    pub fn conditions(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().filter_map(|e| e.condition)
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(
                f,
                "{:?}: 0x{:02X} {}",
                entry.position,
                entry.raw,
                entry.condition.unwrap_or("unknown")
            )?;
        }
        Ok(())
    }
}

static D1_CONDITIONS: &[(u8, &str)] = &[
    (0xB0, "Chiller Running"),
    (0xB1, "Chiller Faulted"),
    (0xB2, "Process Supply RTD open or shorted"),
    (0xB3, "Process Return RTD open or shorted"),
    (0xB4, "Suction RTD open or shorted"),
    (0xB5, "Entering Air or Facility Water RTD open or shorted"),
    (0xB6, "High Temp Error"),
    (0xB7, "Low Temp Error"),
];

static D2_CONDITIONS: &[(u8, &str)] = &[
    (0xB0, "High Pressure Error"),
    (0xB1, "Low Pressure Error"),
    (0xB2, "High Flow Error (user set able)"),
    (0xB3, "Low Flow Error (user set able)"),
    (0xB4, "High Flow Error (user set able)"),
    (0xB5, "Low Level Error"),
    (0xB6, "Drip Pan fault"),
    (0xB7, "Auto Refill fault"),
];

static D3_CONDITIONS: &[(u8, &str)] = &[
    (0xB0, "HTC (High Temperature Cutout)"),
    (0xB1, "LLC (Low Level Cutout)"),
    (0xB2, "MOL (Motor Overload)"),
    (0xB3, "Phase Monitor"),
    (0xB4, "HPC (High Pressure Cutout)"),
    (0xB5, "LPC (Low Pressure Cutout)"),
    (0xB6, "EMO"),
    (0xB7, "External EMO"),
];

static D4_CONDITIONS: &[(u8, &str)] = &[
    (0xB0, "RA T_MAX (High Temperature)"),
    (0xB1, "Not used"),
    (0xB2, "Auto Refill Valve Open"),
    (0xB3, "Anti Drainback Valve Open"),
    (0xB4, "Clogged Fluid Filter Fault"),
    (0xB5, "Temp Fault Startup Bypass"),
    (0xB6, "System Low Flow"),
    (0xB7, "Not used"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_each_position() {
        assert_eq!(decode(StatusByte::D1, 0xB0), Some("Chiller Running"));
        assert_eq!(decode(StatusByte::D2, 0xB5), Some("Low Level Error"));
        assert_eq!(decode(StatusByte::D3, 0xB6), Some("EMO"));
        assert_eq!(decode(StatusByte::D4, 0xB4), Some("Clogged Fluid Filter Fault"));
    }

    #[test]
    fn test_values_are_not_bitmasks() {
        // 0xB3 is its own condition, not 0xB1 | 0xB2
        assert_eq!(decode(StatusByte::D1, 0xB3), Some("Process Return RTD open or shorted"));
        assert_eq!(decode(StatusByte::D1, 0x01), None);
        assert_eq!(decode(StatusByte::D1, 0xB8), None);
    }

    #[test]
    fn test_report() {
        let report = StatusReport::from_bytes([0xB0, 0x00, 0xB4, 0xB2]);
        let conditions: Vec<_> = report.conditions().collect();
        assert_eq!(
            conditions,
            vec!["Chiller Running", "HPC (High Pressure Cutout)", "Auto Refill Valve Open"]
        );
        assert_eq!(report.entries[1].condition, None);
        assert!(report.to_string().contains("D2: 0x00 unknown"));
    }
}
