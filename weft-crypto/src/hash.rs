// src/hash.rs

//! SHA-256 hashing for transactions and wire messages.

use crate::errors::{CryptoError, Result};
use crate::HASH_SIZE;
use sha2::{Digest, Sha256};

/// 32-byte SHA-256 digest
pub type Hash = [u8; HASH_SIZE];

/// Sentinel hash carried by transactions that have not been mined yet
pub const INVALID_HASH: Hash = [0u8; HASH_SIZE];

/// Computes the SHA-256 hash of input data
///
/// # Arguments
/// * `data` - Input data to hash
///
/// # Returns
/// 32-byte hash digest
///
/// # Example
/// ```
/// use weft_crypto::hash::sha256;
///
/// let hash = sha256(b"hello weft");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hashes multiple data chunks together without intermediate allocation
pub fn sha256_chunks(chunks: &[&[u8]]) -> Hash {
    let mut hasher = Sha256::new();
    for chunk in chunks {
        hasher.update(chunk);
    }
    hasher.finalize().into()
}

/// Converts a hash to a lowercase hexadecimal string
pub fn hash_to_hex(hash: &Hash) -> String {
    hex::encode(hash)
}

/// Parses a 64-character hexadecimal string into a hash
pub fn hex_to_hash(hex_str: &str) -> Result<Hash> {
    if hex_str.len() != HASH_SIZE * 2 {
        return Err(CryptoError::HashError(format!(
            "Invalid hex length: expected {}, got {}",
            HASH_SIZE * 2,
            hex_str.len()
        )));
    }

    let bytes = hex::decode(hex_str)
        .map_err(|e| CryptoError::HashError(format!("Hex decode failed: {}", e)))?;

    let mut hash = [0u8; HASH_SIZE];
    hash.copy_from_slice(&bytes);
    Ok(hash)
}

/// Counts the leading zero hex digits (nibbles) of a hash
///
/// This is the proof-of-work measure: a transaction mined at difficulty `d`
/// must have a hash with at least `d` leading zero nibbles.
pub fn leading_zero_nibbles(hash: &Hash) -> u32 {
    let mut count = 0;
    for byte in hash {
        if *byte == 0 {
            count += 2;
        } else {
            if byte >> 4 == 0 {
                count += 1;
            }
            break;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_deterministic() {
        let hash1 = sha256(b"test data");
        let hash2 = sha256(b"test data");
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_sha256_different_input() {
        assert_ne!(sha256(b"data1"), sha256(b"data2"));
    }

    #[test]
    fn test_sha256_chunks_matches_concatenation() {
        let hash1 = sha256_chunks(&[b"hello", b"world"]);
        let hash2 = sha256(b"helloworld");
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_hash_to_hex_and_back() {
        let original = sha256(b"round trip");
        let hex = hash_to_hex(&original);
        assert_eq!(hex.len(), 64);

        let restored = hex_to_hash(&hex).unwrap();
        assert_eq!(original, restored);
    }

    #[test]
    fn test_hex_to_hash_invalid_length() {
        assert!(hex_to_hash("abcd").is_err());
    }

    #[test]
    fn test_hex_to_hash_invalid_chars() {
        let invalid = "g".repeat(64);
        assert!(hex_to_hash(&invalid).is_err());
    }

    #[test]
    fn test_leading_zero_nibbles() {
        let mut hash = [0xffu8; 32];
        assert_eq!(leading_zero_nibbles(&hash), 0);

        hash[0] = 0x0f;
        assert_eq!(leading_zero_nibbles(&hash), 1);

        hash[0] = 0x00;
        assert_eq!(leading_zero_nibbles(&hash), 2);

        hash[1] = 0x01;
        assert_eq!(leading_zero_nibbles(&hash), 2);

        assert_eq!(leading_zero_nibbles(&INVALID_HASH), 64);
    }
}
