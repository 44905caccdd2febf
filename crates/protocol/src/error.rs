//! Protocol error types

use thiserror::Error;

/// Protocol-level errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Attribute text is not a literal `0` or `1`
    #[error("Invalid switch value {input:?}: expected \"0\" or \"1\"")]
    InvalidSwitch { input: String },

    /// Wire byte carries bits outside the LED bits
    #[error("Invalid LED byte {byte:#04x}: only bits 0-2 may be set")]
    InvalidWireByte { byte: u8 },

    /// Name does not refer to one of the LEDs
    #[error("Unknown LED name: {0}")]
    UnknownLed(String),
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;
