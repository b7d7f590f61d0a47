//! Baud rates
//!
//! The fixed set of UART speeds the EZO circuit can be switched to.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AtlasError;

/// UART speeds the probe accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum BaudRate {
    /// 300 bps
    B300,
    /// 1200 bps
    B1200,
    /// 2400 bps
    B2400,
    /// 9600 bps
    B9600,
    /// 19200 bps
    B19200,
    /// 38400 bps
    B38400,
    /// 57600 bps
    B57600,
    /// 115200 bps
    B115200,
}

impl BaudRate {
    /// Every supported rate, ascending
    pub const ALL: [BaudRate; 8] = [
        BaudRate::B300,
        BaudRate::B1200,
        BaudRate::B2400,
        BaudRate::B9600,
        BaudRate::B19200,
        BaudRate::B38400,
        BaudRate::B57600,
        BaudRate::B115200,
    ];

    /// Rate in bits per second
    pub fn as_u32(self) -> u32 {
        match self {
            BaudRate::B300 => 300,
            BaudRate::B1200 => 1200,
            BaudRate::B2400 => 2400,
            BaudRate::B9600 => 9600,
            BaudRate::B19200 => 19200,
            BaudRate::B38400 => 38400,
            BaudRate::B57600 => 57600,
            BaudRate::B115200 => 115200,
        }
    }
}

impl Default for BaudRate {
    fn default() -> Self {
        BaudRate::B9600
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = AtlasError;

    fn try_from(rate: u32) -> Result<Self, Self::Error> {
        BaudRate::ALL
            .into_iter()
            .find(|b| b.as_u32() == rate)
            .ok_or(AtlasError::InvalidBaudRate(rate))
    }
}

impl From<BaudRate> for u32 {
    fn from(rate: BaudRate) -> u32 {
        rate.as_u32()
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}
