//! Serial port enumeration
//!
//! ThermoFlex units are usually reached through a USB-to-RS-232 adapter, so
//! USB details are kept to help pick the right port.

use serialport::{available_ports, SerialPortType};
use tracing::info;

use crate::error::LinkError;

/// Information about a serial port
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port name (e.g., /dev/ttyUSB0, COM3)
    pub port: String,
    /// USB Vendor ID (if USB)
    pub vid: Option<u16>,
    /// USB Product ID (if USB)
    pub pid: Option<u16>,
    /// USB product string
    pub product: Option<String>,
}

impl SerialPortInfo {
    fn from_serialport(name: String, port_type: &SerialPortType) -> Self {
        match port_type {
            SerialPortType::UsbPort(usb) => Self {
                port: name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                product: usb.product.clone(),
            },
            _ => Self {
                port: name,
                vid: None,
                pid: None,
                product: None,
            },
        }
    }

    /// One-line description for listings
    pub fn describe(&self) -> String {
        match (self.vid, self.pid) {
            (Some(vid), Some(pid)) => format!(
                "{} [{:04x}:{:04x}] {}",
                self.port,
                vid,
                pid,
                self.product.as_deref().unwrap_or("")
            )
            .trim_end()
            .to_string(),
            _ => self.port.clone(),
        }
    }
}

/// Serial port scanner
pub struct PortScanner {
    skip_patterns: Vec<String>,
}

impl PortScanner {
    pub fn new() -> Self {
        Self {
            skip_patterns: vec![
                // Bluetooth ports on macOS
                "Bluetooth".to_string(),
                "debug".to_string(),
            ],
        }
    }

    /// Enumerate all available serial ports
    pub fn enumerate_ports(&self) -> Result<Vec<SerialPortInfo>, LinkError> {
        let ports = available_ports().map_err(|e| LinkError::EnumerationFailed(e.to_string()))?;

        let result: Vec<_> = ports
            .into_iter()
            .map(|p| SerialPortInfo::from_serialport(p.port_name, &p.port_type))
            .filter(|p| !self.should_skip_port(p))
            .collect();

        info!("Found {} serial port(s)", result.len());
        Ok(result)
    }

    fn should_skip_port(&self, port: &SerialPortInfo) -> bool {
        self.skip_patterns.iter().any(|p| port.port.contains(p))
    }
}

impl Default for PortScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    #[test]
    fn test_usb_adapter_description() {
        let usb_info = SerialPortType::UsbPort(UsbPortInfo {
            vid: 0x067b,
            pid: 0x2303,
            serial_number: None,
            manufacturer: Some("Prolific".to_string()),
            product: Some("USB-Serial Controller".to_string()),
        });

        let info = SerialPortInfo::from_serialport("/dev/ttyUSB0".to_string(), &usb_info);
        assert_eq!(info.vid, Some(0x067b));
        assert_eq!(
            info.describe(),
            "/dev/ttyUSB0 [067b:2303] USB-Serial Controller"
        );
    }

    #[test]
    fn test_skips_bluetooth() {
        let scanner = PortScanner::new();
        let port = SerialPortInfo::from_serialport(
            "/dev/cu.Bluetooth-Incoming-Port".to_string(),
            &SerialPortType::Unknown,
        );
        assert!(scanner.should_skip_port(&port));
    }
}
