//! Control-socket protocol shared by the vici-tunnel client and responder
//!
//! This crate provides the wire layer used to talk to an IKE daemon over its
//! local control socket. It includes:
//!
//! - Message element codec (key/values, lists, nested sections)
//! - Packet types and packet codec
//! - Length-prefixed framing over a byte stream
//! - Unix domain socket helpers and well-known default paths

/// Well-known default paths and protocol limits
pub mod config;

/// Wire errors
pub mod error;

/// Message element codec
pub mod message;

/// Packet codec
pub mod packet;

/// Unix domain socket connect/bind helpers
pub mod platform_socket;

/// Length-prefixed packet framing
pub mod stream;

// Re-export commonly used types for convenience
pub use config::{DEFAULT_SOCKET_PATH, MAX_PACKET_SIZE};
pub use error::WireError;
pub use message::{Element, Message};
pub use packet::{Packet, PacketType};
pub use platform_socket::{bind_socket, connect_socket};
pub use stream::PacketStream;
