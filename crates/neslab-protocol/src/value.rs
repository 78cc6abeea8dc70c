//! Qualified analog values
//!
//! When the chiller reports a value it sends a qualifier byte first, followed
//! by a 2 or 4 byte integer with the least significant byte last. The high
//! nibble of the qualifier selects the unit; the low nibble is the number of
//! decimal places.

use std::fmt;

use crate::error::ParseError;

/// Engineering unit from the qualifier byte's high nibble
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Unit {
    None = 0,
    Celsius = 1,
    Fahrenheit = 2,
    LitersPerMinute = 3,
    GallonsPerMinute = 4,
    Seconds = 5,
    Psi = 6,
    Bar = 7,
    MegaohmCm = 8,
    Percent = 9,
    Volts = 10,
    Kilopascal = 11,
    MicrosiemensPerCm = 12,
}

impl Unit {
    /// Look up a unit code (0-12)
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Unit::None,
            1 => Unit::Celsius,
            2 => Unit::Fahrenheit,
            3 => Unit::LitersPerMinute,
            4 => Unit::GallonsPerMinute,
            5 => Unit::Seconds,
            6 => Unit::Psi,
            7 => Unit::Bar,
            8 => Unit::MegaohmCm,
            9 => Unit::Percent,
            10 => Unit::Volts,
            11 => Unit::Kilopascal,
            12 => Unit::MicrosiemensPerCm,
            _ => return None,
        })
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::None => "",
            Unit::Celsius => "°C",
            Unit::Fahrenheit => "°F",
            Unit::LitersPerMinute => "L/min",
            Unit::GallonsPerMinute => "gal/min",
            Unit::Seconds => "s",
            Unit::Psi => "psi",
            Unit::Bar => "bar",
            Unit::MegaohmCm => "MΩ·cm",
            Unit::Percent => "%",
            Unit::Volts => "V",
            Unit::Kilopascal => "kPa",
            Unit::MicrosiemensPerCm => "µS/cm",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Decoded qualifier byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Qualifier {
    pub unit: Unit,
    /// Decimal places; the value is scaled by `10^-exponent`
    pub exponent: u8,
}

impl Qualifier {
    pub fn new(unit: Unit, exponent: u8) -> Self {
        Self { unit, exponent }
    }

    pub fn from_byte(byte: u8) -> Result<Self, ParseError> {
        let code = (byte & 0xF0) >> 4;
        let unit = Unit::from_code(code).ok_or(ParseError::UnknownUnit(code))?;
        Ok(Self {
            unit,
            exponent: byte & 0x0F,
        })
    }

    pub fn to_byte(&self) -> u8 {
        ((self.unit as u8) << 4) | (self.exponent & 0x0F)
    }

    /// Size of one count, e.g. 0.1 for one decimal place
    pub fn precision(&self) -> f64 {
        1.0 / 10f64.powi(self.exponent as i32)
    }
}

/// An analog value as reported by the chiller
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnalogReading {
    /// Byte count field of the response (qualifier + integer bytes)
    pub byte_count: u8,
    pub qualifier: Qualifier,
    /// Unscaled integer
    pub raw: u32,
}

impl AnalogReading {
    pub fn unit(&self) -> Unit {
        self.qualifier.unit
    }

    pub fn precision(&self) -> f64 {
        self.qualifier.precision()
    }

    /// Scaled physical value
    pub fn value(&self) -> f64 {
        self.raw as f64 / 10f64.powi(self.qualifier.exponent as i32)
    }

    /// Raw integer the chiller expects back for `value` at this reading's precision
    ///
    /// Set commands carry no qualifier, so the host has to reuse the precision
    /// it last read. Returns `None` if the value does not fit in two bytes.
    pub fn raw_for(&self, value: f64) -> Option<u16> {
        let scaled = (value * 10f64.powi(self.qualifier.exponent as i32)).round();
        if (0.0..=u16::MAX as f64).contains(&scaled) {
            Some(scaled as u16)
        } else {
            None
        }
    }
}

impl fmt::Display for AnalogReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let places = self.qualifier.exponent as usize;
        match self.unit() {
            Unit::None => write!(f, "{:.*}", places, self.value()),
            unit => write!(f, "{:.*} {}", places, self.value(), unit),
        }
    }
}
