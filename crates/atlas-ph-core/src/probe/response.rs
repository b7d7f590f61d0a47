//! Response parsing
//!
//! Pure functions turning single response lines into typed values.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

use crate::error::{AtlasError, Result};

/// Prefix marking a status line
pub const STATUS_PREFIX: char = '*';

/// Token acknowledging a successful command
pub const ACK_TOKEN: &str = "OK";

fn digit_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").unwrap())
}

fn extended_scale() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\?phext,([01])$").unwrap())
}

/// A response line, classified
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ResponseLine {
    /// Device state such as `*OK`, `*ER` or `*RS`
    Status(String),
    /// Measurement or query payload
    Data(String),
}

impl ResponseLine {
    /// Classify a raw line by its leading character
    pub fn classify(line: impl Into<String>) -> Self {
        let line = line.into();
        if line.starts_with(STATUS_PREFIX) {
            ResponseLine::Status(line)
        } else {
            ResponseLine::Data(line)
        }
    }

    /// Check if this is a status line
    pub fn is_status(&self) -> bool {
        matches!(self, ResponseLine::Status(_))
    }

    /// The raw line text
    pub fn text(&self) -> &str {
        match self {
            ResponseLine::Status(s) | ResponseLine::Data(s) => s,
        }
    }
}

/// Parse a reading line as a pH value
pub fn parse_ph(line: &str) -> Result<f64> {
    line.trim().parse::<f64>().map_err(|_| AtlasError::Parse {
        expected: "float",
        raw: line.to_string(),
    })
}

/// Extract the first run of digits in a baud query reply (e.g. `?Baud,9600`)
pub fn parse_baud(line: &str) -> Result<u32> {
    digit_run()
        .find(line)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .ok_or_else(|| AtlasError::Parse {
            expected: "baud rate",
            raw: line.to_string(),
        })
}

/// Check if a reply acknowledges the command
pub fn is_ok(line: &str) -> bool {
    line.contains(ACK_TOKEN)
}

/// Parse an extended pH scale query reply (`?pHext,1`)
pub fn parse_extended_scale(line: &str) -> Result<bool> {
    let caps = extended_scale()
        .captures(line.trim())
        .ok_or_else(|| AtlasError::Protocol {
            command: "pHext,?".to_string(),
            response: line.to_string(),
        })?;
    Ok(&caps[1] == "1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ph_values() {
        assert_eq!(parse_ph("7.00").unwrap(), 7.0);
        assert_eq!(parse_ph("-1.23").unwrap(), -1.23);
        assert_eq!(parse_ph("14.000").unwrap(), 14.0);
        assert_eq!(parse_ph(" 6.5 ").unwrap(), 6.5);
    }

    #[test]
    fn test_parse_ph_rejects_status() {
        let err = parse_ph("*OK").unwrap_err();
        assert!(matches!(err, AtlasError::Parse { ref raw, .. } if raw == "*OK"));
        assert!(parse_ph("").is_err());
    }

    #[test]
    fn test_parse_baud() {
        assert_eq!(parse_baud("Baud,9600").unwrap(), 9600);
        assert_eq!(parse_baud("?BAUD,115200").unwrap(), 115200);
        assert!(matches!(
            parse_baud("no-digits-here"),
            Err(AtlasError::Parse { raw, .. }) if raw == "no-digits-here"
        ));
    }

    #[test]
    fn test_is_ok() {
        assert!(is_ok("*OK"));
        assert!(is_ok("OK"));
        assert!(!is_ok("*ER"));
        assert!(!is_ok("ERR"));
    }

    #[test]
    fn test_extended_scale() {
        assert!(parse_extended_scale("?pHext,1").unwrap());
        assert!(!parse_extended_scale("?PHEXT,0").unwrap());
        assert!(matches!(
            parse_extended_scale("*ER"),
            Err(AtlasError::Protocol { .. })
        ));
    }

    #[test]
    fn test_classify() {
        assert!(ResponseLine::classify("*OK").is_status());
        assert_eq!(
            ResponseLine::classify("7.01"),
            ResponseLine::Data("7.01".to_string())
        );
        assert_eq!(ResponseLine::classify("*WA").text(), "*WA");
    }
}
