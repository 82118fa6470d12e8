// src/node.rs

//! Graph nodes wrapping transactions.
//!
//! Nodes refer to each other by hash only; the engine's hash map is the
//! single owning structure, so the parent/child cycle cannot leak. The
//! mutable `children` list and the cumulative weight sit behind per-node
//! read/write locks so traversals never need the engine mutex.

use crate::errors::{Result, TangleError};
use crate::transaction::Transaction;
use crate::types::Hash;
use crate::WEIGHT_DIFFICULTY_DIVISOR;
use std::sync::RwLock;

/// A transaction attached to the graph
pub struct TangleNode {
    transaction: Transaction,

    /// Child hashes in insertion order
    children: RwLock<Vec<Hash>>,

    /// Cumulative weight: own weight plus the children's cumulative weights
    weight: RwLock<f64>,

    is_genesis: bool,
}

impl TangleNode {
    /// Wraps a transaction in a fresh, childless node
    pub fn new(transaction: Transaction, is_genesis: bool) -> Self {
        let own_weight = own_weight_for(transaction.difficulty);
        Self {
            transaction,
            children: RwLock::new(Vec::new()),
            weight: RwLock::new(own_weight),
            is_genesis,
        }
    }

    /// The wrapped transaction
    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    /// The transaction hash
    pub fn hash(&self) -> Hash {
        self.transaction.hash
    }

    /// Parent hashes (immutable after construction)
    pub fn parents(&self) -> &[Hash] {
        &self.transaction.parents
    }

    /// Whether this node is the graph root
    pub fn is_genesis(&self) -> bool {
        self.is_genesis
    }

    /// Snapshot of the child hashes, in insertion order
    pub fn children(&self) -> Result<Vec<Hash>> {
        Ok(self
            .children
            .read()
            .map_err(|e| TangleError::Engine(format!("Lock poisoned: {}", e)))?
            .clone())
    }

    /// Whether the node has any children (false means it is a tip)
    pub fn has_children(&self) -> Result<bool> {
        Ok(!self
            .children
            .read()
            .map_err(|e| TangleError::Engine(format!("Lock poisoned: {}", e)))?
            .is_empty())
    }

    pub(crate) fn push_child(&self, child: Hash) -> Result<()> {
        let mut children = self
            .children
            .write()
            .map_err(|e| TangleError::Engine(format!("Lock poisoned: {}", e)))?;
        if !children.contains(&child) {
            children.push(child);
        }
        Ok(())
    }

    pub(crate) fn remove_child(&self, child: &Hash) -> Result<()> {
        self.children
            .write()
            .map_err(|e| TangleError::Engine(format!("Lock poisoned: {}", e)))?
            .retain(|c| c != child);
        Ok(())
    }

    /// The node's own weight: `min(difficulty / 5, 1)`
    pub fn own_weight(&self) -> f64 {
        own_weight_for(self.transaction.difficulty)
    }

    /// The current cumulative weight
    ///
    /// A hint, not an exact descendant count: the background worker
    /// maintains the recurrence `own_weight + sum of children's weights`,
    /// which is monotone under child addition.
    pub fn cumulative_weight(&self) -> Result<f64> {
        Ok(*self
            .weight
            .read()
            .map_err(|e| TangleError::Engine(format!("Lock poisoned: {}", e)))?)
    }

    /// Writes a recomputed weight, never letting the stored value decrease
    pub(crate) fn store_weight(&self, weight: f64) -> Result<()> {
        let mut stored = self
            .weight
            .write()
            .map_err(|e| TangleError::Engine(format!("Lock poisoned: {}", e)))?;
        if weight > *stored {
            *stored = weight;
        }
        Ok(())
    }
}

fn own_weight_for(difficulty: u8) -> f64 {
    (difficulty as f64 / WEIGHT_DIFFICULTY_DIVISOR).min(1.0)
}
