//! NESLAB Chiller Simulation Library
//!
//! This crate provides a simulated chiller for testing protocol clients
//! without physical hardware. It includes:
//!
//! - **VirtualChiller**: answers request frames with protocol-accurate responses
//! - **run_chiller_task**: serves a virtual chiller over any async byte stream
//!
//! # Example
//!
//! ```rust
//! use neslab_protocol::{build, decode_analog, Params};
//! use neslab_sim::VirtualChiller;
//!
//! let mut chiller = VirtualChiller::new("ThermoFlex 900");
//! chiller.set_register("req_temp1", 183);
//!
//! let request = build("req_temp1", &Params::new()).unwrap();
//! let response = chiller.handle_frame(&request).unwrap();
//! assert_eq!(decode_analog(&response).unwrap().value(), 18.3);
//! ```

pub mod chiller;
pub mod task;

pub use chiller::{Register, VirtualChiller, VirtualChillerConfig};
pub use task::{run_chiller_task, VirtualChillerCommand};
