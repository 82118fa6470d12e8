// src/lib.rs

//! # Weft Wallet
//!
//! Key-file management for the weft tangle protocol.
//!
//! Accounts are plain ECDSA keypairs. A key file is the PKCS#8 DER
//! encoding of the keypair, deflate-compressed. Loading always validates
//! that the public and private halves correspond before handing the
//! keypair out.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod errors;
pub mod keystore;

// Re-export commonly used types
pub use crate::errors::{Result, WalletError};
pub use crate::keystore::{load_key_file, save_key_file};
