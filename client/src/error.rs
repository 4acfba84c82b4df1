// Error types for the tunnel manager

use std::io;

use thiserror::Error;
use vici_common::WireError;

#[derive(Error, Debug)]
pub enum Error {
    /// Control socket unreachable, closed early or timed out
    #[error("Transport error: {0}")]
    Transport(#[from] io::Error),

    /// Daemon rejected the command or answered with something unparseable
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A referenced certificate file could not be turned into PEM text
    #[error("Certificate error for '{filename}': {reason}")]
    Certificate { filename: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }

    pub fn is_certificate(&self) -> bool {
        matches!(self, Error::Certificate { .. })
    }
}

impl From<WireError> for Error {
    fn from(err: WireError) -> Self {
        match err {
            WireError::Io(io_err) => Error::Transport(io_err),
            other => Error::Protocol(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
