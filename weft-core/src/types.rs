// src/types.rs

//! Core type definitions using weft-crypto

pub use weft_crypto::hash::{hash_to_hex, hex_to_hash, leading_zero_nibbles};
pub use weft_crypto::{Hash, HASH_SIZE, INVALID_HASH};

/// Microseconds since the Unix epoch
pub type Timestamp = u64;

/// Current wall-clock time in microseconds
pub fn current_timestamp() -> Timestamp {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("System time should be after Unix epoch")
        .as_micros() as Timestamp
}
