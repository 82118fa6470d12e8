// src/errors.rs

//! Error types for tangle operations.
//!
//! Every validation failure surfaces as a specific kind so callers (and
//! gossip listeners) can distinguish a bad hash from a bad signature from an
//! overdrawn account.

use crate::types::Hash;
use std::fmt;
use weft_crypto::hash::hash_to_hex;

/// Main error type for tangle operations
#[derive(Debug, Clone, PartialEq)]
pub enum TangleError {
    /// A transaction or message hash does not match its recomputed value
    InvalidHash {
        /// The hash the sender claimed
        expected: Hash,
        /// The hash recomputed from the payload
        actual: Hash,
    },

    /// An input signature failed to verify under its declared account
    InvalidSignature(String),

    /// Transaction outputs exceed its inputs
    InvalidTotals {
        /// Sum of input amounts
        inputs: f64,
        /// Sum of output amounts
        outputs: f64,
    },

    /// The transaction hash does not satisfy its declared mining difficulty
    NotMined(u8),

    /// A referenced node is absent from the graph
    NodeNotFound(Hash),

    /// Attempted to remove a node that still has children
    NotATip(Hash),

    /// An account balance would go negative at the given node
    InvalidBalance {
        /// The node at which the balance first went negative
        node: Hash,
        /// The overdrawn account hash
        account: String,
        /// The offending running balance
        balance: f64,
    },

    /// An unknown public-key hash was requested as an output target
    InvalidAccount(String),

    /// Mining or synchronization was interrupted
    Cancelled,

    /// Internal engine failure (poisoned lock, dead worker)
    Engine(String),

    /// Byte-stream read or write failed
    Io(String),

    /// Persisted or wire data could not be decoded
    Decode(String),
}

impl fmt::Display for TangleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TangleError::InvalidHash { expected, actual } => write!(
                f,
                "Invalid hash: expected `{}`, got `{}`",
                hash_to_hex(expected),
                hash_to_hex(actual)
            ),
            TangleError::InvalidSignature(account) => {
                write!(f, "Invalid signature for account `{}`", account)
            }
            TangleError::InvalidTotals { inputs, outputs } => write!(
                f,
                "Transaction outputs ({}) exceed its inputs ({})",
                outputs, inputs
            ),
            TangleError::NotMined(difficulty) => {
                write!(f, "Hash does not satisfy mining difficulty {}", difficulty)
            }
            TangleError::NodeNotFound(hash) => {
                write!(f, "Failed to find node with hash `{}`", hash_to_hex(hash))
            }
            TangleError::NotATip(hash) => write!(
                f,
                "Only tip nodes can be removed from the graph. Tried to remove non-tip with hash `{}`",
                hash_to_hex(hash)
            ),
            TangleError::InvalidBalance { node, account, balance } => write!(
                f,
                "Account `{}` would have negative balance {} at node `{}`",
                account,
                balance,
                hash_to_hex(node)
            ),
            TangleError::InvalidAccount(account) => {
                write!(f, "Unknown account `{}`", account)
            }
            TangleError::Cancelled => write!(f, "Operation was cancelled"),
            TangleError::Engine(msg) => write!(f, "Engine error: {}", msg),
            TangleError::Io(msg) => write!(f, "I/O error: {}", msg),
            TangleError::Decode(msg) => write!(f, "Decode error: {}", msg),
        }
    }
}

impl std::error::Error for TangleError {}

impl From<std::io::Error> for TangleError {
    fn from(err: std::io::Error) -> Self {
        TangleError::Io(err.to_string())
    }
}

/// Result type alias for tangle operations
pub type Result<T> = std::result::Result<T, TangleError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::INVALID_HASH;

    #[test]
    fn test_error_display() {
        let err = TangleError::NodeNotFound(INVALID_HASH);
        assert_eq!(
            format!("{}", err),
            format!("Failed to find node with hash `{}`", "0".repeat(64))
        );
    }

    #[test]
    fn test_invalid_totals_display() {
        let err = TangleError::InvalidTotals {
            inputs: 10.0,
            outputs: 20.0,
        };
        assert!(format!("{}", err).contains("20"));
    }
}
