//! # Meter Error Handling
//!
//! This module defines the MeterError enum, which represents the different
//! error types that can occur while talking IEC 62056-21 Mode C.
//!
//! Frame-level checksum errors are retried once inside the session
//! orchestrator; operation-level errors surface to the caller; only
//! transport and handshake failures tear down the connection.

use thiserror::Error;

/// Represents the different error types that can occur in the IEC 62056-21 crate.
#[derive(Debug, Error)]
pub enum MeterError {
    /// Indicates a serial/TCP port open, read or write failure.
    /// Fatal for the connection; the caller must reconnect.
    #[error("Transport error: {0}")]
    Transport(String),

    /// No identification response within the timeout during the handshake.
    #[error("Handshake timeout: no identification response from meter")]
    HandshakeTimeout,

    /// The identification response could not be parsed (bad prefix, short
    /// manufacturer flag, or unknown baud indicator).
    #[error("Identification parse error: {0}")]
    IdentificationParse(String),

    /// The meter did not answer after the mode selection ACK.
    #[error("Mode rejected: no response after selecting mode {mode}")]
    ModeRejected { mode: char },

    /// Indicates a BCC mismatch on a received data block.
    #[error("Invalid checksum: expected 0x{expected:02X}, calculated 0x{calculated:02X}")]
    Checksum { expected: u8, calculated: u8 },

    /// The device answered with NAK. Terminal for the current operation only.
    #[error("Device rejected the request (NAK)")]
    DeviceRejected,

    /// No forward progress across repeated empty blocks during a paginated read.
    #[error("Stalled device: {0} consecutive empty blocks")]
    Stalled(u32),

    /// Caller-initiated cancellation. Always safe; the connection stays usable.
    #[error("Operation cancelled")]
    Cancelled,

    /// An OBIS code failed shape validation before being sent to the device.
    #[error("Invalid OBIS code: {0}")]
    InvalidObisCode(String),

    /// The requested register was not present in the readout block.
    #[error("OBIS code {0} not found in data block")]
    ObisNotFound(String),

    /// Operation requires an active connection.
    #[error("Not connected to a meter")]
    NotConnected,

    /// Operation requires an authenticated programming session.
    #[error("Not authenticated: programming mode with a valid password is required")]
    NotAuthenticated,

    /// Password failed local validation (must be exactly 8 ASCII digits).
    #[error("Invalid password format: expected exactly 8 digits")]
    InvalidPassword,

    /// A catch-all error for uncategorized cases.
    #[error("Protocol error: {0}")]
    Other(String),
}

impl MeterError {
    /// True when the connection itself is unusable and the caller must
    /// reconnect from scratch.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MeterError::Transport(_)
                | MeterError::HandshakeTimeout
                | MeterError::IdentificationParse(_)
                | MeterError::ModeRejected { .. }
        )
    }
}

impl From<std::io::Error> for MeterError {
    fn from(e: std::io::Error) -> Self {
        MeterError::Transport(e.to_string())
    }
}
