// src/errors.rs

//! Error types for the network layer.

use std::fmt;
use weft_core::TangleError;

/// Main error type for network operations
#[derive(Debug)]
pub enum NetworkError {
    /// A tangle operation failed while handling a message
    Tangle(TangleError),

    /// Underlying socket I/O failed
    IoError(std::io::Error),

    /// A frame could not be encoded or decoded
    InvalidMessage(String),

    /// The referenced peer is not connected
    UnknownPeer(String),

    /// Establishing or accepting a connection failed
    ConnectionError(String),

    /// The port-discovery handshake failed
    HandshakeError(String),
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::Tangle(err) => write!(f, "Tangle error: {}", err),
            NetworkError::IoError(err) => write!(f, "I/O error: {}", err),
            NetworkError::InvalidMessage(msg) => write!(f, "Invalid message: {}", msg),
            NetworkError::UnknownPeer(peer) => write!(f, "Unknown peer: {}", peer),
            NetworkError::ConnectionError(msg) => write!(f, "Connection error: {}", msg),
            NetworkError::HandshakeError(msg) => write!(f, "Handshake error: {}", msg),
        }
    }
}

impl std::error::Error for NetworkError {}

impl From<TangleError> for NetworkError {
    fn from(err: TangleError) -> Self {
        NetworkError::Tangle(err)
    }
}

impl From<std::io::Error> for NetworkError {
    fn from(err: std::io::Error) -> Self {
        NetworkError::IoError(err)
    }
}

impl From<bincode::Error> for NetworkError {
    fn from(err: bincode::Error) -> Self {
        NetworkError::InvalidMessage(err.to_string())
    }
}

/// Result type alias for network operations
pub type Result<T> = std::result::Result<T, NetworkError>;
