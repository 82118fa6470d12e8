// src/lib.rs

//! # Weft Network
//!
//! P2P gossip layer for the weft tangle protocol.
//!
//! This crate provides:
//! - **Message taxonomy**: typed gossip messages with self-validating hashes
//! - **Transport abstraction**: broadcast plus unicast over plain TCP with
//!   length-prefixed frames, one reader thread per peer
//! - **Networked tangle**: gossip listeners, the orphan queue, initial
//!   full-graph synchronization, and the peer key directory
//! - **Handshake**: the sidechannel port-discovery exchange
//!
//! ## Synchronization flow
//!
//! A newcomer broadcasts `TangleSynchronizeRequest` and enters a
//! "listening for genesis" state. Every established peer streams its whole
//! graph back: the genesis as `SyncGenesisRequest`, every other node as
//! `SynchronizationAddTransactionRequest` in parent-before-child order.
//! Live traffic arrives as `AddTransactionRequest`; transactions whose
//! parents have not arrived yet wait in a FIFO orphan queue that is drained
//! once after every successful insertion.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod errors;
pub mod gossip;
pub mod handshake;
pub mod message;
pub mod transport;

// Re-export commonly used types
pub use crate::errors::{NetworkError, Result};
pub use crate::gossip::NetworkedTangle;
pub use crate::message::{Message, Payload};
pub use crate::transport::{MessageHandler, PeerId, TcpNetwork, Transport};

/// Default gossip port
pub const DEFAULT_GOSSIP_PORT: u16 = 4801;

/// Default handshake (port discovery) port
pub const DEFAULT_HANDSHAKE_PORT: u16 = 4802;

/// Message size limit (10 MB)
pub const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// How often the accept loops poll their should-run flag
pub const ACCEPT_POLL_INTERVAL_MS: u64 = 50;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_ne!(DEFAULT_GOSSIP_PORT, DEFAULT_HANDSHAKE_PORT);
        assert!(MAX_MESSAGE_SIZE > 1024);
    }
}
