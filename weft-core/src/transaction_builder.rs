// src/transaction_builder.rs

//! Transaction assembly, signing, and proof-of-work mining.
//!
//! Mining is the only long-running cancellable operation in the core: the
//! nonce search polls a shared flag at every attempt and fails with
//! `Cancelled` when it is raised.

use crate::errors::{Result, TangleError};
use crate::transaction::{Input, Output, Transaction};
use crate::types::{leading_zero_nibbles, Hash};
use std::sync::atomic::{AtomicBool, Ordering};
use weft_crypto::{KeyPair, PublicKey};

/// Cooperative cancellation flag for a mining run
///
/// Share one behind an `Arc` with the thread that may want to interrupt the
/// search.
#[derive(Debug, Default)]
pub struct MineControl {
    cancelled: AtomicBool,
}

impl MineControl {
    /// Creates a fresh, uncancelled control
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of the mining run
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Searches nonces until the transaction hash satisfies its difficulty
///
/// Takes the least nonce whose hash has at least `difficulty` leading zero
/// hex digits. The found `(nonce, hash)` pair freezes the transaction.
///
/// # Errors
/// `Cancelled` if the control flag is raised before a nonce is found.
pub fn mine(mut tx: Transaction, control: &MineControl) -> Result<Transaction> {
    let target = tx.difficulty as u32;
    let mut nonce: u64 = 0;
    loop {
        if control.is_cancelled() {
            return Err(TangleError::Cancelled);
        }

        tx.nonce = nonce;
        let hash = tx.compute_hash();
        if leading_zero_nibbles(&hash) >= target {
            tx.hash = hash;
            return Ok(tx);
        }

        nonce = nonce.wrapping_add(1);
    }
}

/// Builder assembling a signed, mined transaction
///
/// Spends are registered together with the keypair that authorizes them;
/// the builder signs every input over the unsigned encoding before mining.
pub struct TransactionBuilder<'a> {
    parents: Vec<Hash>,
    spends: Vec<(&'a KeyPair, f64)>,
    outputs: Vec<Output>,
    difficulty: u8,
}

impl<'a> TransactionBuilder<'a> {
    /// Creates an empty builder with difficulty 1
    pub fn new() -> Self {
        Self {
            parents: Vec::new(),
            spends: Vec::new(),
            outputs: Vec::new(),
            difficulty: 1,
        }
    }

    /// Approves `parent` as one of the transaction's parents
    pub fn parent(mut self, parent: Hash) -> Self {
        self.parents.push(parent);
        self
    }

    /// Approves every hash in `parents`
    pub fn parents(mut self, parents: Vec<Hash>) -> Self {
        self.parents.extend(parents);
        self
    }

    /// Spends `amount` from the account owned by `keypair`
    pub fn spend(mut self, keypair: &'a KeyPair, amount: f64) -> Self {
        self.spends.push((keypair, amount));
        self
    }

    /// Credits `amount` to `account`
    pub fn pay(mut self, account: PublicKey, amount: f64) -> Self {
        self.outputs.push(Output { account, amount });
        self
    }

    /// Sets the mining difficulty
    pub fn difficulty(mut self, difficulty: u8) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// Signs every input and mines the transaction
    ///
    /// # Errors
    /// `Cancelled` if the control flag is raised during the nonce search.
    pub fn build_and_mine(self, control: &MineControl) -> Result<Transaction> {
        let inputs = self
            .spends
            .iter()
            .map(|(keypair, amount)| Input {
                account: keypair.public_key().clone(),
                amount: *amount,
                signature: Vec::new(),
            })
            .collect();

        let mut tx = Transaction::new(self.parents, inputs, self.outputs, self.difficulty);

        let unsigned = tx.encode_unsigned();
        for (input, (keypair, _)) in tx.inputs.iter_mut().zip(&self.spends) {
            input.signature = keypair.sign(&unsigned);
        }

        mine(tx, control)
    }
}

impl Default for TransactionBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}
