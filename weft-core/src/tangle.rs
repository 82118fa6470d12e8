// src/tangle.rs

//! The tangle engine: graph ownership, insertion, balances, genesis
//! management.
//!
//! A single mutex serializes structural mutation (`add`, `remove_tip`,
//! `set_genesis`). Reads never take it; they synchronize on the per-node
//! children locks only. The engine keeps a hash-to-node map so every lookup
//! is O(1); nodes refer to each other by hash alone.

use crate::errors::{Result, TangleError};
use crate::node::TangleNode;
use crate::transaction::Transaction;
use crate::types::{Hash, INVALID_HASH};
use crate::walk;
use crate::weights::WeightQueue;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use weft_crypto::PublicKey;

/// Shared hash-to-node map, also read by the weight worker
pub(crate) type NodeMap = Arc<RwLock<HashMap<Hash, Arc<TangleNode>>>>;

/// Options controlling how a transaction is inserted
#[derive(Clone, Copy, Debug)]
pub struct AddOptions {
    /// Validate that every input account can cover its amount
    ///
    /// Disabled during initial bulk synchronization, where history arrives
    /// in an order that would otherwise reject legitimate transactions.
    pub check_balance: bool,

    /// Queue the node for cumulative-weight recomputation
    ///
    /// Disabled during a bulk load, which runs one full pass afterwards.
    pub update_weights: bool,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self {
            check_balance: true,
            update_weights: true,
        }
    }
}

/// The local tangle
pub struct Tangle {
    nodes: NodeMap,
    genesis: RwLock<Hash>,
    tips: RwLock<Vec<Hash>>,

    /// Engine mutex: the single lock over structural mutation
    structure: Mutex<()>,

    weights: WeightQueue,
}

impl Tangle {
    /// Creates a tangle rooted at the given genesis transaction
    pub fn new(genesis: Transaction) -> Result<Self> {
        genesis.validate_mined()?;

        let nodes: NodeMap = Arc::new(RwLock::new(HashMap::new()));
        let weights = WeightQueue::spawn(Arc::clone(&nodes));

        let node = Arc::new(TangleNode::new(genesis, true));
        let hash = node.hash();
        nodes
            .write()
            .map_err(|e| TangleError::Engine(format!("Lock poisoned: {}", e)))?
            .insert(hash, node);

        Ok(Self {
            nodes,
            genesis: RwLock::new(hash),
            tips: RwLock::new(vec![hash]),
            structure: Mutex::new(()),
            weights,
        })
    }

    /// The current genesis hash
    pub fn genesis_hash(&self) -> Result<Hash> {
        Ok(*self
            .genesis
            .read()
            .map_err(|e| TangleError::Engine(format!("Lock poisoned: {}", e)))?)
    }

    /// The current genesis node
    pub fn genesis(&self) -> Result<Arc<TangleNode>> {
        let hash = self.genesis_hash()?;
        self.find(&hash)?.ok_or(TangleError::NodeNotFound(hash))
    }

    /// Resolves a hash to its node, if present
    pub fn find(&self, hash: &Hash) -> Result<Option<Arc<TangleNode>>> {
        Ok(self
            .nodes
            .read()
            .map_err(|e| TangleError::Engine(format!("Lock poisoned: {}", e)))?
            .get(hash)
            .cloned())
    }

    /// Whether the hash resolves in the graph
    pub fn contains(&self, hash: &Hash) -> Result<bool> {
        Ok(self.find(hash)?.is_some())
    }

    /// Point-in-time snapshot of the tip set, in insertion order
    pub fn tips(&self) -> Result<Vec<Hash>> {
        Ok(self
            .tips
            .read()
            .map_err(|e| TangleError::Engine(format!("Lock poisoned: {}", e)))?
            .clone())
    }

    /// Number of nodes in the graph, genesis included
    pub fn len(&self) -> Result<usize> {
        Ok(self
            .nodes
            .read()
            .map_err(|e| TangleError::Engine(format!("Lock poisoned: {}", e)))?
            .len())
    }

    /// Whether the graph holds only a genesis (never truly empty)
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? <= 1)
    }

    /// Inserts a fully validated transaction with default options
    ///
    /// Returns the transaction hash. Inserting an already-present hash is a
    /// silent no-op.
    pub fn add(&self, tx: Transaction) -> Result<Hash> {
        self.add_with(tx, AddOptions::default())
    }

    /// Inserts a transaction with explicit validation options
    pub fn add_with(&self, tx: Transaction, options: AddOptions) -> Result<Hash> {
        let hash = tx.hash;
        if self.contains(&hash)? {
            return Ok(hash);
        }

        tx.validate_mined()?;
        tx.validate_signatures()?;
        tx.validate_totals()?;

        // A parentless transaction can only enter as a genesis
        if tx.parents.is_empty() {
            return Err(TangleError::NodeNotFound(INVALID_HASH));
        }
        for parent in &tx.parents {
            if !self.contains(parent)? {
                return Err(TangleError::NodeNotFound(*parent));
            }
        }

        if options.check_balance {
            for input in &tx.inputs {
                let balance = self.query_balance(&input.account, 0.0)?;
                if balance < input.amount {
                    return Err(TangleError::InvalidBalance {
                        node: hash,
                        account: input.account.account_hash(),
                        balance: balance - input.amount,
                    });
                }
            }
        }

        let _guard = self
            .structure
            .lock()
            .map_err(|e| TangleError::Engine(format!("Lock poisoned: {}", e)))?;

        // Re-check under the engine mutex: a concurrent insert may have won
        // the race, and a genesis replacement may have dropped the parents.
        if self.contains(&hash)? {
            return Ok(hash);
        }
        let mut parents = Vec::with_capacity(tx.parents.len());
        for parent_hash in &tx.parents {
            match self.find(parent_hash)? {
                Some(parent) => parents.push(parent),
                None => return Err(TangleError::NodeNotFound(*parent_hash)),
            }
        }

        let node = Arc::new(TangleNode::new(tx, false));
        self.nodes
            .write()
            .map_err(|e| TangleError::Engine(format!("Lock poisoned: {}", e)))?
            .insert(hash, node);

        {
            let mut tips = self
                .tips
                .write()
                .map_err(|e| TangleError::Engine(format!("Lock poisoned: {}", e)))?;
            for parent in &parents {
                let parent_hash = parent.hash();
                tips.retain(|tip| *tip != parent_hash);
                parent.push_child(hash)?;
            }
            tips.push(hash);
        }

        if options.update_weights {
            self.weights.enqueue(hash)?;
        }

        Ok(hash)
    }

    /// Removes a childless node from the graph
    ///
    /// # Errors
    /// `NodeNotFound` if the hash does not resolve, `NotATip` if the node
    /// still has children.
    pub fn remove_tip(&self, hash: &Hash) -> Result<()> {
        let _guard = self
            .structure
            .lock()
            .map_err(|e| TangleError::Engine(format!("Lock poisoned: {}", e)))?;
        self.remove_tip_locked(hash)
    }

    /// Tip removal body, caller holds the engine mutex
    fn remove_tip_locked(&self, hash: &Hash) -> Result<()> {
        let node = self.find(hash)?.ok_or(TangleError::NodeNotFound(*hash))?;
        if node.has_children()? {
            return Err(TangleError::NotATip(*hash));
        }
        if node.is_genesis() {
            return Err(TangleError::Engine(
                "The genesis node cannot be removed".to_string(),
            ));
        }

        for parent_hash in node.parents() {
            if let Some(parent) = self.find(parent_hash)? {
                parent.remove_child(hash)?;
                if !parent.has_children()? {
                    let mut tips = self
                        .tips
                        .write()
                        .map_err(|e| TangleError::Engine(format!("Lock poisoned: {}", e)))?;
                    if !tips.contains(parent_hash) {
                        tips.push(*parent_hash);
                    }
                }
            }
        }

        self.tips
            .write()
            .map_err(|e| TangleError::Engine(format!("Lock poisoned: {}", e)))?
            .retain(|tip| tip != hash);
        self.nodes
            .write()
            .map_err(|e| TangleError::Engine(format!("Lock poisoned: {}", e)))?
            .remove(hash);

        Ok(())
    }

    /// Replaces the graph root, discarding all current descendants
    ///
    /// Used during initial synchronization. Serialized on the engine mutex:
    /// concurrent `add`s observe the teardown as missing parents and fail
    /// with `NodeNotFound` rather than a mid-teardown state.
    pub fn set_genesis(&self, genesis: Transaction) -> Result<()> {
        genesis.validate_mined()?;

        let _guard = self
            .structure
            .lock()
            .map_err(|e| TangleError::Engine(format!("Lock poisoned: {}", e)))?;

        // Tear down everything below the current genesis, tips first
        loop {
            let current = self.genesis_hash()?;
            let has_children = match self.find(&current)? {
                Some(node) => node.has_children()?,
                None => false,
            };
            if !has_children {
                break;
            }
            for tip in self.tips()? {
                if tip != current {
                    self.remove_tip_locked(&tip)?;
                }
            }
        }

        let node = Arc::new(TangleNode::new(genesis, true));
        let hash = node.hash();
        {
            let mut nodes = self
                .nodes
                .write()
                .map_err(|e| TangleError::Engine(format!("Lock poisoned: {}", e)))?;
            nodes.clear();
            nodes.insert(hash, node);
        }
        *self
            .genesis
            .write()
            .map_err(|e| TangleError::Engine(format!("Lock poisoned: {}", e)))? = hash;
        *self
            .tips
            .write()
            .map_err(|e| TangleError::Engine(format!("Lock poisoned: {}", e)))? = vec![hash];

        Ok(())
    }

    /// Balance of `account` counting only nodes confirmed at `threshold`
    ///
    /// Walks breadth-first from the genesis, counting each node at most
    /// once. A threshold of 0 skips the confidence filter entirely and
    /// yields the pessimistic balance `add` validates against.
    ///
    /// # Errors
    /// `InvalidBalance` if any visited prefix drives the balance negative.
    pub fn query_balance(&self, account: &PublicKey, threshold: f64) -> Result<f64> {
        let genesis = self.genesis_hash()?;
        let mut queue = VecDeque::from([genesis]);
        let mut seen: HashSet<Hash> = HashSet::from([genesis]);
        let mut balance = 0.0;

        while let Some(hash) = queue.pop_front() {
            let node = match self.find(&hash)? {
                Some(node) => node,
                None => continue,
            };

            let confirmed = threshold <= 0.0
                || walk::confirmation_confidence(self, &hash)? >= threshold;
            if confirmed {
                let tx = node.transaction();
                for input in &tx.inputs {
                    if &input.account == account {
                        balance -= input.amount;
                    }
                }
                for output in &tx.outputs {
                    if &output.account == account {
                        balance += output.amount;
                    }
                }
                if balance < 0.0 {
                    return Err(TangleError::InvalidBalance {
                        node: hash,
                        account: account.account_hash(),
                        balance,
                    });
                }
            }

            for child in node.children()? {
                if seen.insert(child) {
                    queue.push_back(child);
                }
            }
        }

        Ok(balance)
    }

    /// Every node in topological order, parents before children
    pub fn list_transactions(&self) -> Result<Vec<Arc<TangleNode>>> {
        let order = self.topological_order()?;
        let mut out = Vec::with_capacity(order.len());
        for hash in order {
            if let Some(node) = self.find(&hash)? {
                out.push(node);
            }
        }
        Ok(out)
    }

    /// Kahn's ordering over the graph, rooted at the genesis
    pub(crate) fn topological_order(&self) -> Result<Vec<Hash>> {
        let genesis = self.genesis_hash()?;
        let mut pending: HashMap<Hash, usize> = HashMap::new();
        let mut queue = VecDeque::from([genesis]);
        let mut order = Vec::new();
        let mut seen: HashSet<Hash> = HashSet::from([genesis]);

        while let Some(hash) = queue.pop_front() {
            let node = match self.find(&hash)? {
                Some(node) => node,
                None => continue,
            };
            order.push(hash);

            for child in node.children()? {
                let child_node = match self.find(&child)? {
                    Some(node) => node,
                    None => continue,
                };
                let remaining = pending
                    .entry(child)
                    .or_insert_with(|| child_node.parents().len());
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 && seen.insert(child) {
                    queue.push_back(child);
                }
            }
        }

        Ok(order)
    }

    /// Longest path from the genesis to `hash` (0 for the genesis)
    pub fn height(&self, hash: &Hash) -> Result<u64> {
        let mut heights: HashMap<Hash, u64> = HashMap::new();
        for node_hash in self.topological_order()? {
            let node = match self.find(&node_hash)? {
                Some(node) => node,
                None => continue,
            };
            let height = node
                .parents()
                .iter()
                .filter_map(|p| heights.get(p))
                .map(|h| h + 1)
                .max()
                .unwrap_or(0);
            heights.insert(node_hash, height);
        }
        heights
            .get(hash)
            .copied()
            .ok_or(TangleError::NodeNotFound(*hash))
    }

    /// Longest path from `hash` to any tip (0 for tips)
    pub fn depth(&self, hash: &Hash) -> Result<u64> {
        self.depth_map()?
            .get(hash)
            .copied()
            .ok_or(TangleError::NodeNotFound(*hash))
    }

    /// Depths of every node, computed tips-first in one pass
    pub(crate) fn depth_map(&self) -> Result<HashMap<Hash, u64>> {
        let order = self.topological_order()?;
        let mut depths: HashMap<Hash, u64> = HashMap::new();
        for hash in order.iter().rev() {
            let node = match self.find(hash)? {
                Some(node) => node,
                None => continue,
            };
            let depth = node
                .children()?
                .iter()
                .filter_map(|c| depths.get(c))
                .map(|d| d + 1)
                .max()
                .unwrap_or(0);
            depths.insert(*hash, depth);
        }
        Ok(depths)
    }

    /// Whether `target` lies in the reflexive transitive closure of
    /// `ancestor`'s children
    pub fn is_child(&self, ancestor: &Hash, target: &Hash) -> Result<bool> {
        if ancestor == target {
            return Ok(true);
        }
        let mut queue = VecDeque::from([*ancestor]);
        let mut seen: HashSet<Hash> = HashSet::from([*ancestor]);
        while let Some(hash) = queue.pop_front() {
            let node = match self.find(&hash)? {
                Some(node) => node,
                None => continue,
            };
            for child in node.children()? {
                if &child == target {
                    return Ok(true);
                }
                if seen.insert(child) {
                    queue.push_back(child);
                }
            }
        }
        Ok(false)
    }
}
