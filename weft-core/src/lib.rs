// src/lib.rs

//! # Weft Core
//!
//! Core implementation of the weft protocol - a peer-to-peer ledger
//! organized as a directed acyclic graph (a "tangle") rather than a linear
//! chain.
//!
//! ## Architecture
//!
//! Every transaction approves one or more prior transactions as parents.
//! Whether a transaction counts as confirmed is derived from biased random
//! walks over the graph and a cumulative-weight score accumulated from its
//! descendants:
//!
//! - **Transactions** carry inputs, outputs, a proof-of-work nonce, and the
//!   hashes of their parents
//! - **The tangle engine** owns the graph, the tip set, and the balance query
//! - **Tip selection** walks the graph from the genesis toward the tips,
//!   favoring heavier branches
//! - **Confirmation confidence** is the fraction of sampled walks whose
//!   terminal tip approves a given transaction
//!
//! ## Example Usage
//!
//! ```rust
//! use weft_core::{Tangle, Transaction, Output, TransactionBuilder, MineControl};
//! use weft_crypto::KeyPair;
//!
//! let alice = KeyPair::generate();
//! let bob = KeyPair::generate();
//!
//! // A genesis granting Alice the initial funds
//! let genesis = Transaction::genesis(vec![Output {
//!     account: alice.public_key().clone(),
//!     amount: 1_000_000.0,
//! }]);
//! let tangle = Tangle::new(genesis).unwrap();
//!
//! // Alice sends Bob 100
//! let tx = TransactionBuilder::new()
//!     .parent(tangle.genesis_hash().unwrap())
//!     .spend(&alice, 100.0)
//!     .pay(bob.public_key().clone(), 100.0)
//!     .difficulty(1)
//!     .build_and_mine(&MineControl::default())
//!     .unwrap();
//! tangle.add(tx).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod errors;
pub mod node;
pub mod persistence;
pub mod tangle;
pub mod transaction;
pub mod transaction_builder;
pub mod types;
pub mod walk;
pub mod weights;

// Re-export crypto for convenience
pub use weft_crypto;

// Re-export commonly used types
pub use crate::errors::{Result, TangleError};
pub use crate::node::TangleNode;
pub use crate::tangle::{AddOptions, Tangle};
pub use crate::transaction::{Input, Output, Transaction};
pub use crate::transaction_builder::{MineControl, TransactionBuilder};
pub use crate::types::{Hash, Timestamp, INVALID_HASH};

/// Alpha parameter biasing random walks toward heavier branches
pub const WALK_ALPHA: f64 = 5.0;

/// Number of walks sampled when estimating confirmation confidence
pub const WALK_COUNT: usize = 100;

/// How far behind a transaction the confidence walks begin
pub const WALK_LOOKBACK: u64 = 10;

/// Recommended user-facing confirmation threshold
pub const CONFIRMATION_THRESHOLD: f64 = 0.95;

/// Divisor mapping mining difficulty to a node's own weight
pub const WEIGHT_DIFFICULTY_DIVISOR: f64 = 5.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(WALK_ALPHA, 5.0);
        assert_eq!(WALK_COUNT, 100);
        assert!(CONFIRMATION_THRESHOLD > 0.0 && CONFIRMATION_THRESHOLD <= 1.0);
    }
}
