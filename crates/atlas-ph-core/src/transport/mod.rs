//! Serial Transport
//!
//! Line-oriented ASCII channel to a probe behind a USB-to-UART bridge.
//!
//! Commands go out terminated by a carriage return, replies come back as
//! carriage-return terminated lines. After every command the channel waits a
//! settle delay before the reply is read.

mod channel;
mod link;
pub mod serial;

pub use channel::{Channel, ChannelConfig, ChannelCounters, ChannelState};
pub use link::SerialLink;
pub use serial::{device_ids, find_device, list_devices, open_port, DeviceInfo};

use std::time::Duration;

/// Factory default UART baud rate of the EZO circuits
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Minimum processing time of the probe after a command
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// Deadline for a single response line
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(2000);

/// Per-read timeout handed to the OS serial port
pub const DEFAULT_PORT_TIMEOUT: Duration = Duration::from_millis(100);

/// Terminator for both commands and response lines
pub const LINE_TERMINATOR: u8 = b'\r';

/// USB vendor ID of FTDI bridges
pub const FTDI_VID: u16 = 0x0403;
