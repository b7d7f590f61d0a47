//! pH Probe
//!
//! Command vocabulary and response parsing for the Atlas Scientific EZO pH
//! circuit, driven over a [`Channel`](crate::transport::Channel).

mod baud;
pub mod commands;
mod ph;
pub mod response;

pub use baud::BaudRate;
pub use commands::Command;
pub use ph::PhProbe;
pub use response::ResponseLine;
