//! Probe commands
//!
//! The ASCII commands understood by the EZO pH circuit.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::BaudRate;

/// Commands the driver issues to the probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Single pH reading (`r`)
    Read,

    /// Query the UART baud rate (`baud,?`)
    QueryBaud,

    /// Switch the UART baud rate (`baud,<rate>`)
    SetBaud(BaudRate),

    /// Query whether the extended pH scale is enabled (`pHext,?`)
    QueryExtendedScale,
}

impl Command {
    /// Wire text, without the terminator
    pub fn text(&self) -> String {
        match self {
            Command::Read => "r".to_string(),
            Command::QueryBaud => "baud,?".to_string(),
            Command::SetBaud(rate) => format!("baud,{}", rate),
            Command::QueryExtendedScale => "pHext,?".to_string(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_text() {
        assert_eq!(Command::Read.text(), "r");
        assert_eq!(Command::QueryBaud.text(), "baud,?");
        assert_eq!(Command::SetBaud(BaudRate::B38400).text(), "baud,38400");
        assert_eq!(Command::QueryExtendedScale.text(), "pHext,?");
    }
}
