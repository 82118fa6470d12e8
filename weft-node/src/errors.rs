// src/errors.rs

//! Error types for the node binary.

use std::fmt;
use weft_core::TangleError;
use weft_network::NetworkError;
use weft_wallet::WalletError;

/// Main error type for node operations
#[derive(Debug)]
pub enum NodeError {
    /// Configuration file problems
    ConfigError(String),

    /// Filesystem access failed
    IoError(std::io::Error),

    /// The gossip layer failed
    Network(NetworkError),

    /// A local tangle operation failed
    Tangle(TangleError),

    /// A key file operation failed
    Wallet(WalletError),

    /// An operation needing the personal keypair ran before one was set
    NoKeys,
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeError::ConfigError(msg) => write!(f, "Config error: {}", msg),
            NodeError::IoError(err) => write!(f, "I/O error: {}", err),
            NodeError::Network(err) => write!(f, "Network error: {}", err),
            NodeError::Tangle(err) => write!(f, "Tangle error: {}", err),
            NodeError::Wallet(err) => write!(f, "Wallet error: {}", err),
            NodeError::NoKeys => write!(f, "No personal keypair is set"),
        }
    }
}

impl std::error::Error for NodeError {}

impl From<std::io::Error> for NodeError {
    fn from(err: std::io::Error) -> Self {
        NodeError::IoError(err)
    }
}

impl From<NetworkError> for NodeError {
    fn from(err: NetworkError) -> Self {
        NodeError::Network(err)
    }
}

impl From<TangleError> for NodeError {
    fn from(err: TangleError) -> Self {
        NodeError::Tangle(err)
    }
}

impl From<WalletError> for NodeError {
    fn from(err: WalletError) -> Self {
        NodeError::Wallet(err)
    }
}

/// Result type alias for node operations
pub type Result<T> = std::result::Result<T, NodeError>;
