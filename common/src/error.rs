use std::io;

use thiserror::Error;

/// Errors raised while encoding, decoding or moving control-protocol packets
#[derive(Error, Debug)]
pub enum WireError {
    /// The underlying socket failed or was closed mid-packet
    #[error("Socket I/O failed: {0}")]
    Io(#[from] io::Error),

    /// A length prefix announced more data than the protocol allows
    #[error("Packet too large: {len} bytes (limit {limit})")]
    TooLarge { len: usize, limit: usize },

    /// The packet ended before the announced element was complete
    #[error("Truncated data while reading {0}")]
    Truncated(&'static str),

    /// A message contained an element type the codec does not know
    #[error("Unknown message element type {0}")]
    UnknownElement(u8),

    /// A packet carried a type byte the codec does not know
    #[error("Unknown packet type {0}")]
    UnknownPacketType(u8),

    /// Section, list and key names must be 1..=255 bytes
    #[error("Invalid element name '{0}'")]
    InvalidName(String),

    /// Values and list items are limited to 65535 bytes
    #[error("Value for '{name}' is too long: {len} bytes")]
    ValueTooLong { name: String, len: usize },

    /// Elements appeared where the grammar does not allow them
    #[error("Malformed message: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, WireError>;
