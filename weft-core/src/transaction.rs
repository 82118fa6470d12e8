// src/transaction.rs

//! Transaction structure, canonical encoding, and validation.
//!
//! A transaction is immutable once mined: its hash covers every field,
//! including input signatures and the nonce found during mining. The
//! *unsigned* encoding - the material each input signs - omits the
//! signatures themselves and the nonce, since signing happens before the
//! nonce is fixed.

use crate::errors::{Result, TangleError};
use crate::types::{current_timestamp, leading_zero_nibbles, Hash, Timestamp, INVALID_HASH};
use serde::{Deserialize, Serialize};
use weft_crypto::hash::sha256;
use weft_crypto::PublicKey;

/// Transaction input spending from an account
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Input {
    /// The account being debited
    pub account: PublicKey,

    /// Amount debited (non-negative)
    pub amount: f64,

    /// ECDSA signature over the unsigned transaction encoding
    pub signature: Vec<u8>,
}

/// Transaction output crediting an account
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Output {
    /// The account being credited
    pub account: PublicKey,

    /// Amount credited (non-negative)
    pub amount: f64,
}

/// A weft transaction
///
/// The `parents` field holds the hashes of the transactions this one
/// approves; it is empty only for the genesis.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    /// Hashes of the approved parent transactions (empty iff genesis)
    pub parents: Vec<Hash>,

    /// Inputs being spent
    pub inputs: Vec<Input>,

    /// Outputs being created
    pub outputs: Vec<Output>,

    /// Required count of leading zero hex digits on `hash`
    pub difficulty: u8,

    /// Proof-of-work nonce found during mining
    pub nonce: u64,

    /// Creation time in microseconds since the Unix epoch
    pub timestamp: Timestamp,

    /// SHA-256 over the canonical encoding of every field above
    pub hash: Hash,
}

impl Transaction {
    /// Creates an unmined transaction skeleton
    ///
    /// The skeleton carries `INVALID_HASH` until mining fixes a nonce; it is
    /// not acceptable to the tangle until then.
    pub fn new(
        parents: Vec<Hash>,
        inputs: Vec<Input>,
        outputs: Vec<Output>,
        difficulty: u8,
    ) -> Self {
        Self {
            parents,
            inputs,
            outputs,
            difficulty,
            nonce: 0,
            timestamp: current_timestamp(),
            hash: INVALID_HASH,
        }
    }

    /// Creates a genesis transaction granting the given outputs from nothing
    pub fn genesis(outputs: Vec<Output>) -> Self {
        let mut tx = Self {
            parents: Vec::new(),
            inputs: Vec::new(),
            outputs,
            difficulty: 0,
            nonce: 0,
            timestamp: current_timestamp(),
            hash: INVALID_HASH,
        };
        tx.hash = tx.compute_hash();
        tx
    }

    /// Whether this transaction is a genesis (no parents)
    pub fn is_genesis(&self) -> bool {
        self.parents.is_empty()
    }

    /// Sum of input amounts
    pub fn input_total(&self) -> f64 {
        self.inputs.iter().map(|i| i.amount).sum()
    }

    /// Sum of output amounts
    pub fn output_total(&self) -> f64 {
        self.outputs.iter().map(|o| o.amount).sum()
    }

    /// The canonical encoding: every field, signatures and nonce included
    pub fn encode(&self) -> Vec<u8> {
        self.encode_fields(true, true)
    }

    /// The pre-signing encoding: signatures and nonce omitted
    pub fn encode_unsigned(&self) -> Vec<u8> {
        self.encode_fields(false, false)
    }

    fn encode_fields(&self, include_signatures: bool, include_nonce: bool) -> Vec<u8> {
        let mut buf = Vec::new();

        buf.extend_from_slice(&(self.parents.len() as u32).to_le_bytes());
        for parent in &self.parents {
            buf.extend_from_slice(parent);
        }

        buf.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            buf.extend_from_slice(&(input.account.as_bytes().len() as u32).to_le_bytes());
            buf.extend_from_slice(input.account.as_bytes());
            buf.extend_from_slice(&input.amount.to_le_bytes());
            if include_signatures {
                buf.extend_from_slice(&(input.signature.len() as u32).to_le_bytes());
                buf.extend_from_slice(&input.signature);
            }
        }

        buf.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            buf.extend_from_slice(&(output.account.as_bytes().len() as u32).to_le_bytes());
            buf.extend_from_slice(output.account.as_bytes());
            buf.extend_from_slice(&output.amount.to_le_bytes());
        }

        buf.push(self.difficulty);
        if include_nonce {
            buf.extend_from_slice(&self.nonce.to_le_bytes());
        }
        buf.extend_from_slice(&self.timestamp.to_le_bytes());

        buf
    }

    /// Recomputes the SHA-256 of the canonical encoding
    pub fn compute_hash(&self) -> Hash {
        sha256(&self.encode())
    }

    /// Checks that `hash` matches the encoding and satisfies `difficulty`
    pub fn validate_mined(&self) -> Result<()> {
        let actual = self.compute_hash();
        if actual != self.hash {
            return Err(TangleError::InvalidHash {
                expected: self.hash,
                actual,
            });
        }
        if leading_zero_nibbles(&self.hash) < self.difficulty as u32 {
            return Err(TangleError::NotMined(self.difficulty));
        }
        Ok(())
    }

    /// Checks that every input signature verifies under its account
    pub fn validate_signatures(&self) -> Result<()> {
        let unsigned = self.encode_unsigned();
        for input in &self.inputs {
            let valid = input
                .account
                .verify(&unsigned, &input.signature)
                .map_err(|_| TangleError::InvalidSignature(input.account.account_hash()))?;
            if !valid {
                return Err(TangleError::InvalidSignature(input.account.account_hash()));
            }
        }
        Ok(())
    }

    /// Checks value conservation: inputs must cover outputs
    ///
    /// Surplus is burned; equality is not required. The genesis is exempt,
    /// it mints the initial funds.
    pub fn validate_totals(&self) -> Result<()> {
        if self.is_genesis() {
            return Ok(());
        }
        let inputs = self.input_total();
        let outputs = self.output_total();
        if inputs < outputs {
            return Err(TangleError::InvalidTotals { inputs, outputs });
        }
        Ok(())
    }
}
