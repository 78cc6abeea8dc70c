//! Opening serial and TCP links
//!
//! The chiller speaks the same frames over either transport; only the read
//! timeout differs. Both openers return plain tokio streams that a
//! [`Chiller`](crate::Chiller) can own.

use std::time::Duration;

use neslab_protocol::{Address, Interface};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::{debug, info};

use crate::error::LinkError;

/// Factory default baud rate of the ThermoFlex serial port
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Kind of byte stream a link runs over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportKind {
    Serial,
    Tcp,
}

impl TransportKind {
    /// Read deadline after each request
    pub fn default_timeout(&self) -> Duration {
        match self {
            TransportKind::Serial => Duration::from_secs(1),
            TransportKind::Tcp => Duration::from_secs(2),
        }
    }
}

/// Settings shared by every request on a link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkConfig {
    /// How long to wait for a response frame
    pub timeout: Duration,
    /// Lead byte convention
    pub interface: Interface,
    /// Device address
    pub address: Address,
}

impl LinkConfig {
    /// Defaults for a transport kind
    pub fn for_transport(kind: TransportKind) -> Self {
        Self {
            timeout: kind.default_timeout(),
            interface: Interface::default(),
            address: Address::default(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self::for_transport(TransportKind::Serial)
    }
}

/// Open a serial port with the chiller's framing: 8 data bits, no parity, one stop bit
pub fn open_serial(port_name: &str, baud_rate: u32) -> Result<SerialStream, LinkError> {
    debug!("Opening {} at {} baud", port_name, baud_rate);

    let stream = tokio_serial::new(port_name, baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open_native_async()
        .map_err(|e| LinkError::OpenFailed {
            target: port_name.to_string(),
            reason: e.to_string(),
        })?;

    info!("Opened serial link on {}", port_name);
    Ok(stream)
}

/// Connect to a serial-to-Ethernet adapter or a simulated chiller
pub async fn connect_tcp(addr: &str) -> Result<TcpStream, LinkError> {
    debug!("Connecting to {}", addr);

    let stream = TcpStream::connect(addr)
        .await
        .map_err(|e| LinkError::OpenFailed {
            target: addr.to_string(),
            reason: e.to_string(),
        })?;
    stream.set_nodelay(true)?;

    info!("Connected TCP link to {}", addr);
    Ok(stream)
}
