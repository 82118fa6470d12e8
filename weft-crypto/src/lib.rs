// src/lib.rs

//! # Weft Crypto
//!
//! Cryptographic primitives for the weft tangle protocol.
//!
//! This crate provides:
//!
//! - **Hashing**: SHA-256 for transaction and message digests
//! - **Signatures**: ECDSA over secp256k1 for transaction inputs
//! - **Key serialization**: PKCS#8 DER export/import for key files
//!
//! ## Example Usage
//!
//! ```rust
//! use weft_crypto::keys::KeyPair;
//! use weft_crypto::hash::sha256;
//!
//! let keypair = KeyPair::generate();
//! let digest = sha256(b"spend 100 to somebody");
//!
//! let signature = keypair.sign(&digest);
//! assert!(keypair.public_key().verify(&digest, &signature).unwrap());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod errors;
pub mod hash;
pub mod keys;

// Re-export commonly used types
pub use crate::errors::{CryptoError, Result};
pub use crate::hash::{Hash, INVALID_HASH};
pub use crate::keys::{KeyPair, PublicKey};

/// Standard hash output size (32 bytes / 256 bits)
pub const HASH_SIZE: usize = 32;

/// SEC1-compressed secp256k1 public key size
pub const PUBLIC_KEY_SIZE: usize = 33;

/// ECDSA signature size (r || s)
pub const SIGNATURE_SIZE: usize = 64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(HASH_SIZE, 32);
        assert_eq!(PUBLIC_KEY_SIZE, 33);
        assert_eq!(SIGNATURE_SIZE, 64);
    }
}
