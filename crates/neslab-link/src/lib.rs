//! NESLAB Chiller Link Library
//!
//! This crate carries protocol frames to and from a chiller over a serial
//! port or a TCP socket, one request at a time.
//!
//! # Example
//!
//! ```rust,no_run
//! use neslab_link::{open_serial, Chiller, LinkConfig, DEFAULT_BAUD_RATE};
//!
//! # async fn run() -> Result<(), neslab_link::LinkError> {
//! let port = open_serial("/dev/ttyUSB0", DEFAULT_BAUD_RATE)?;
//! let chiller = Chiller::new(port, LinkConfig::default());
//!
//! if chiller.ack().await? {
//!     let supply = chiller.read_value("req_temp1").await?;
//!     println!("Supply temperature: {}", supply);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod scanner;
pub mod transport;

pub use client::{matching_request, Chiller};
pub use error::LinkError;
pub use scanner::{PortScanner, SerialPortInfo};
pub use transport::{connect_tcp, open_serial, LinkConfig, TransportKind, DEFAULT_BAUD_RATE};
