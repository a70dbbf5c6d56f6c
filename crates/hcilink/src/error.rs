//! Error types for the hcilink library
//!
//! This module defines the error types used throughout the library.

use thiserror::Error;

/// Errors that can occur while driving the HCI engine
#[derive(Error, Debug)]
pub enum HciError {
    #[error("Failed to open HCI socket: {0}")]
    SocketError(std::io::Error),

    #[error("Failed to bind to HCI device: {0}")]
    BindError(std::io::Error),

    #[error("Transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out waiting for completion of command 0x{opcode:04X}")]
    Timeout { opcode: u16 },

    #[error("Unknown HCI event 0x{0:02X}")]
    UnknownEvent(u8),

    #[error("Unknown HCI packet type 0x{0:02X}")]
    UnknownPacketType(u8),

    #[error("Invalid HCI packet: {0}")]
    InvalidPacket(String),

    #[error("Fragmented ACL packet: declared {declared} bytes, carries {actual}")]
    FragmentedPacket { declared: u16, actual: u16 },

    #[error("Invalid parameter length: {0}")]
    InvalidParamLength(usize),

    #[error("Upper layer error: {0}")]
    UpperLayer(String),
}

impl HciError {
    /// Whether the framer recovers from this error by discarding its buffer
    /// and resynchronising, rather than surfacing it to the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidPacket(_) | Self::UnknownPacketType(_) | Self::UnknownEvent(_)
        )
    }
}

/// Result type for HCI operations
pub type Result<T> = std::result::Result<T, HciError>;
