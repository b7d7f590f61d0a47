//! # Atlas pH Core Library
//!
//! Drives Atlas Scientific pH probes attached through a USB-to-UART bridge.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Device enumeration by USB serial number
//! - A carriage-return framed serial channel with a settle delay
//! - The pH probe command vocabulary (read, baud query/set, extended scale)
//! - A simulated probe for demo mode and tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use atlas_ph_core::{probe::PhProbe, transport::ChannelConfig};
//!
//! let mut probe = PhProbe::open("DK0G4FXK", ChannelConfig::default())?;
//! println!("pH: {}", probe.read_ph()?);
//! probe.set_baud(9600)?;
//! ```

pub mod error;
pub mod probe;
pub mod sim;
pub mod transport;

pub use error::{AtlasError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{AtlasError, Result};
    pub use crate::probe::{BaudRate, Command, PhProbe, ResponseLine};
    pub use crate::sim::SimulatedProbe;
    pub use crate::transport::{
        device_ids, list_devices, Channel, ChannelConfig, ChannelState, DeviceInfo, SerialLink,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
