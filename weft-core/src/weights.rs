// src/weights.rs

//! Cumulative-weight propagation.
//!
//! A single background worker owns weight recomputation. Each `add`
//! enqueues the new node's hash; the worker walks from there toward the
//! genesis, recomputing every visited ancestor as its own weight plus the
//! sum of its immediate children's cumulative weights. Each parent is
//! enqueued exactly once per add.
//!
//! The recurrence sums *immediate* children rather than all descendants.
//! That quantity grows from the tips inward and is monotone under child
//! addition, which is all the walk bias needs; it is not the conventional
//! "sum of approving transactions' own weights".

use crate::errors::{Result, TangleError};
use crate::tangle::{NodeMap, Tangle};
use crate::types::Hash;
use std::collections::{HashSet, VecDeque};
use std::sync::mpsc::{channel, Sender};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};

/// Handle to the background weight worker
pub(crate) struct WeightQueue {
    sender: Mutex<Option<Sender<Hash>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl WeightQueue {
    /// Spawns the worker thread over a shared node map
    pub(crate) fn spawn(nodes: NodeMap) -> Self {
        let (sender, receiver) = channel::<Hash>();

        let worker = thread::spawn(move || {
            while let Ok(start) = receiver.recv() {
                // A poisoned lock means another thread panicked; the worker
                // just stops updating hints.
                if propagate(&nodes, start).is_err() {
                    break;
                }
            }
        });

        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queues a freshly inserted node for ancestor recomputation
    pub(crate) fn enqueue(&self, hash: Hash) -> Result<()> {
        let sender = self
            .sender
            .lock()
            .map_err(|e| TangleError::Engine(format!("Lock poisoned: {}", e)))?;
        match sender.as_ref() {
            Some(sender) => sender
                .send(hash)
                .map_err(|_| TangleError::Engine("Weight worker is gone".to_string())),
            None => Err(TangleError::Engine("Weight worker is gone".to_string())),
        }
    }
}

impl Drop for WeightQueue {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        if let Ok(mut worker) = self.worker.lock() {
            if let Some(handle) = worker.take() {
                let _ = handle.join();
            }
        }
    }
}

/// Walks from `start` toward the genesis, recomputing ancestor weights
fn propagate(nodes: &NodeMap, start: Hash) -> Result<()> {
    let mut queue = VecDeque::new();
    let mut seen = HashSet::new();

    let first = {
        let map = nodes
            .read()
            .map_err(|e| TangleError::Engine(format!("Lock poisoned: {}", e)))?;
        map.get(&start).cloned()
    };
    if let Some(node) = first {
        for parent in node.parents() {
            if seen.insert(*parent) {
                queue.push_back(*parent);
            }
        }
    }

    while let Some(hash) = queue.pop_front() {
        let node = {
            let map = nodes
                .read()
                .map_err(|e| TangleError::Engine(format!("Lock poisoned: {}", e)))?;
            map.get(&hash).cloned()
        };
        let node = match node {
            Some(node) => node,
            // Removed while we walked (genesis replacement); nothing to do
            None => continue,
        };

        let mut weight = node.own_weight();
        for child in node.children()? {
            let child_node = {
                let map = nodes
                    .read()
                    .map_err(|e| TangleError::Engine(format!("Lock poisoned: {}", e)))?;
                map.get(&child).cloned()
            };
            if let Some(child_node) = child_node {
                weight += child_node.cumulative_weight()?;
            }
        }
        node.store_weight(weight)?;

        for parent in node.parents() {
            if seen.insert(*parent) {
                queue.push_back(*parent);
            }
        }
    }

    Ok(())
}

impl Tangle {
    /// Recomputes every cumulative weight from the tips upward
    ///
    /// Used after a bulk load and by the `UpdateWeights` gossip message;
    /// normal inserts rely on the incremental worker instead.
    pub fn update_weights(&self) -> Result<()> {
        let order = self.topological_order()?;
        for hash in order.iter().rev() {
            let node = match self.find(hash)? {
                Some(node) => node,
                None => continue,
            };

            let mut weight = node.own_weight();
            for child in node.children()? {
                if let Some(child_node) = self.find(&child)? {
                    weight += child_node.cumulative_weight()?;
                }
            }
            node.store_weight(weight)?;
        }
        Ok(())
    }
}
