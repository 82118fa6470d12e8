// src/message.rs

//! Gossip message taxonomy and wire serialization.
//!
//! Every message carries a `validity_hash` that must equal the recomputed
//! digest of its payload after deserialization; a mismatch drops the
//! message. Messages travel as bincode inside length-prefixed TCP frames.

use crate::errors::Result;
use serde::{Deserialize, Serialize};
use weft_core::{Hash, TangleError, Transaction};
use weft_crypto::hash::sha256;
use weft_crypto::PublicKey;

/// Envelope around a gossip payload
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// Digest the payload must hash to after deserialization
    pub validity_hash: Hash,

    /// The typed payload
    pub payload: Payload,
}

impl Message {
    /// Wraps a payload, stamping its digest
    pub fn new(payload: Payload) -> Self {
        Self {
            validity_hash: payload.digest(),
            payload,
        }
    }

    /// Checks the validity hash against the recomputed payload digest
    pub fn verify(&self) -> Result<()> {
        let actual = self.payload.digest();
        if actual != self.validity_hash {
            return Err(TangleError::InvalidHash {
                expected: self.validity_hash,
                actual,
            }
            .into());
        }
        Ok(())
    }

    /// Serializes the message to wire bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserializes a message from wire bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// The gossip payload taxonomy
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Payload {
    /// Asks every recipient to announce its public key
    PublicKeySyncRequest,

    /// Announces the sender's public key for the peer directory
    PublicKeySyncResponse {
        /// The announced account key
        public_key: PublicKey,
    },

    /// Asks every recipient to stream its whole graph back to the sender
    TangleSynchronizeRequest,

    /// Replaces the recipient's genesis, iff it asked for a sync
    SyncGenesisRequest {
        /// The sender's genesis transaction
        genesis: Transaction,
    },

    /// Bulk-sync insertion with balance validation relaxed
    SynchronizationAddTransactionRequest {
        /// The streamed transaction
        transaction: Transaction,
    },

    /// Normal live gossip insertion
    AddTransactionRequest {
        /// The published transaction
        transaction: Transaction,
    },

    /// Forces a full cumulative-weight recomputation pass
    UpdateWeightsRequest,
}

impl Payload {
    /// The digest a well-formed envelope must carry for this payload
    pub fn digest(&self) -> Hash {
        match self {
            Payload::PublicKeySyncRequest => sha256(b"public-key-sync-request"),
            Payload::PublicKeySyncResponse { public_key } => sha256(public_key.as_bytes()),
            Payload::TangleSynchronizeRequest => sha256(b"tangle-synchronize-request"),
            Payload::SyncGenesisRequest { genesis } => genesis.hash,
            Payload::SynchronizationAddTransactionRequest { transaction } => transaction.hash,
            Payload::AddTransactionRequest { transaction } => transaction.hash,
            Payload::UpdateWeightsRequest => sha256(b"update-weights-request"),
        }
    }

    /// Short name for logging
    pub fn type_name(&self) -> &'static str {
        match self {
            Payload::PublicKeySyncRequest => "PublicKeySyncRequest",
            Payload::PublicKeySyncResponse { .. } => "PublicKeySyncResponse",
            Payload::TangleSynchronizeRequest => "TangleSynchronizeRequest",
            Payload::SyncGenesisRequest { .. } => "SyncGenesisRequest",
            Payload::SynchronizationAddTransactionRequest { .. } => {
                "SynchronizationAddTransactionRequest"
            }
            Payload::AddTransactionRequest { .. } => "AddTransactionRequest",
            Payload::UpdateWeightsRequest => "UpdateWeightsRequest",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::NetworkError;
    use weft_core::Output;
    use weft_crypto::KeyPair;

    fn sample_tx() -> Transaction {
        Transaction::genesis(vec![Output {
            account: KeyPair::from_seed(&[1u8; 32]).public_key().clone(),
            amount: 10.0,
        }])
    }

    #[test]
    fn test_message_verifies_after_round_trip() {
        let msg = Message::new(Payload::AddTransactionRequest {
            transaction: sample_tx(),
        });

        let bytes = msg.to_bytes().unwrap();
        let decoded = Message::from_bytes(&bytes).unwrap();
        decoded.verify().unwrap();
        assert_eq!(decoded.validity_hash, msg.validity_hash);
    }

    #[test]
    fn test_tampered_message_is_rejected() {
        let mut msg = Message::new(Payload::SyncGenesisRequest {
            genesis: sample_tx(),
        });
        msg.validity_hash[0] ^= 0xff;

        match msg.verify() {
            Err(NetworkError::Tangle(TangleError::InvalidHash { .. })) => {}
            other => panic!("expected InvalidHash, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_payloads_have_distinct_digests() {
        assert_ne!(
            Payload::PublicKeySyncRequest.digest(),
            Payload::TangleSynchronizeRequest.digest()
        );
        assert_ne!(
            Payload::TangleSynchronizeRequest.digest(),
            Payload::UpdateWeightsRequest.digest()
        );
    }

    #[test]
    fn test_type_names() {
        assert_eq!(
            Payload::PublicKeySyncRequest.type_name(),
            "PublicKeySyncRequest"
        );
        assert_eq!(
            Payload::UpdateWeightsRequest.type_name(),
            "UpdateWeightsRequest"
        );
    }
}
