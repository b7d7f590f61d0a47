//! Driver errors

use thiserror::Error;

/// Errors that can occur while talking to an Atlas probe
#[derive(Error, Debug)]
pub enum AtlasError {
    /// The serial port could not be opened or configured
    #[error("Connection failed: {0}")]
    Connection(String),

    /// No attached device carries the requested identifier
    #[error("No device with identifier '{0}' is attached")]
    DeviceNotFound(String),

    /// No complete line arrived before the read deadline
    #[error("Timed out waiting for a response line")]
    Timeout,

    /// The channel was closed before the operation
    #[error("Channel is not open")]
    NotOpen,

    /// A response line did not hold the expected value
    #[error("Failed to parse response as {expected}: got '{raw}'")]
    Parse {
        /// What the line should have contained
        expected: &'static str,
        /// The line as received
        raw: String,
    },

    /// A caller-supplied value was rejected before any I/O
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The rate is not one the probe accepts
    #[error("Unsupported baud rate: {0}")]
    InvalidBaudRate(u32),

    /// The probe answered with something the command does not allow
    #[error("Unexpected response to '{command}': '{response}'")]
    Protocol {
        /// Command text that was sent
        command: String,
        /// Line the probe answered with
        response: String,
    },

    /// Zero bytes of the command reached the device
    #[error("Command '{0}' was not sent")]
    CommandNotSent(String),

    /// Underlying serial I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AtlasError {
    /// Whether a caller may reasonably retry the operation that produced this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AtlasError::Timeout
                | AtlasError::Parse { .. }
                | AtlasError::Protocol { .. }
                | AtlasError::CommandNotSent(_)
                | AtlasError::Io(_)
        )
    }

    /// The offending raw text carried by a parse or protocol error
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            AtlasError::Parse { raw, .. } => Some(raw),
            AtlasError::Protocol { response, .. } => Some(response),
            _ => None,
        }
    }
}

/// Convenience alias for results carrying [`AtlasError`]
pub type Result<T> = std::result::Result<T, AtlasError>;
