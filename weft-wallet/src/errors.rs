// src/errors.rs

//! Error types for key-file operations.

use std::fmt;
use weft_crypto::CryptoError;

/// Main error type for wallet operations
#[derive(Debug)]
pub enum WalletError {
    /// Reading or writing the key file failed
    IoError(std::io::Error),

    /// The key material could not be decoded or did not validate
    Crypto(CryptoError),

    /// The compressed stream was malformed
    CompressionError(String),
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletError::IoError(err) => write!(f, "I/O error: {}", err),
            WalletError::Crypto(err) => write!(f, "Key error: {}", err),
            WalletError::CompressionError(msg) => write!(f, "Compression error: {}", msg),
        }
    }
}

impl std::error::Error for WalletError {}

impl From<std::io::Error> for WalletError {
    fn from(err: std::io::Error) -> Self {
        WalletError::IoError(err)
    }
}

impl From<CryptoError> for WalletError {
    fn from(err: CryptoError) -> Self {
        WalletError::Crypto(err)
    }
}

/// Result type alias for wallet operations
pub type Result<T> = std::result::Result<T, WalletError>;
