// src/errors.rs

//! Error types for cryptographic operations.

use std::fmt;

/// Main error type for cryptographic operations
#[derive(Debug, Clone, PartialEq)]
pub enum CryptoError {
    /// Invalid key format, size, or a public/private mismatch
    InvalidKey(String),

    /// Signature generation or verification failed
    SignatureError(String),

    /// Hash encoding or decoding failed
    HashError(String),

    /// Key serialization (DER) failed
    KeyEncoding(String),
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::InvalidKey(msg) => write!(f, "Invalid key: {}", msg),
            CryptoError::SignatureError(msg) => write!(f, "Signature error: {}", msg),
            CryptoError::HashError(msg) => write!(f, "Hash error: {}", msg),
            CryptoError::KeyEncoding(msg) => write!(f, "Key encoding error: {}", msg),
        }
    }
}

impl std::error::Error for CryptoError {}

/// Result type alias for cryptographic operations
pub type Result<T> = std::result::Result<T, CryptoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CryptoError::InvalidKey("key too short".to_string());
        assert_eq!(format!("{}", err), "Invalid key: key too short");
    }
}
