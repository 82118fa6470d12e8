// src/walk.rs

//! Biased random walks, walk sets, and confirmation confidence.
//!
//! Tip selection descends from the genesis toward the tips, at every hop
//! sampling among the children with weights exponential in their cumulative
//! weight. Confirmation confidence runs one walk from each entry of a walk
//! set generated behind the transaction and reports the fraction of
//! terminal tips that approve it.
//!
//! Walks are read-only and tolerate concurrent structural mutation: the
//! child snapshot is taken under a children read lock per hop, so a walk
//! may miss the very newest child but never observes a torn list.

use crate::errors::{Result, TangleError};
use crate::tangle::Tangle;
use crate::types::Hash;
use crate::{WALK_ALPHA, WALK_COUNT, WALK_LOOKBACK};
use rand::Rng;
use std::collections::{HashSet, VecDeque};

/// Walks from `start` to a tip, favoring heavier children
///
/// At each hop a child `c` of the current node is chosen with probability
/// proportional to `max(exp(-alpha * (current.weight - c.weight)), eps)`.
/// With probability `p_step_back` the walk instead retreats to a random
/// parent (disabled by default).
pub fn biased_random_walk(
    tangle: &Tangle,
    start: &Hash,
    alpha: f64,
    p_step_back: f64,
) -> Result<Hash> {
    let mut rng = rand::thread_rng();
    let mut current = *start;

    loop {
        let node = tangle
            .find(&current)?
            .ok_or(TangleError::NodeNotFound(current))?;

        let children = node.children()?;
        if children.is_empty() {
            return Ok(current);
        }

        if p_step_back > 0.0 && !node.parents().is_empty() && rng.gen::<f64>() < p_step_back {
            let parents = node.parents();
            current = parents[rng.gen_range(0..parents.len())];
            continue;
        }

        let current_weight = node.cumulative_weight()?;
        let mut weights = Vec::with_capacity(children.len());
        let mut total = 0.0;
        for child in &children {
            let child_weight = match tangle.find(child)? {
                Some(child_node) => child_node.cumulative_weight()?,
                None => 0.0,
            };
            let weight =
                (-alpha * (current_weight - child_weight)).exp().max(f64::MIN_POSITIVE);
            weights.push(weight);
            total += weight;
        }

        let mut target = rng.gen_range(0.0..total);
        let mut chosen = children[children.len() - 1];
        for (i, weight) in weights.iter().enumerate() {
            if target < *weight {
                chosen = children[i];
                break;
            }
            target -= weight;
        }
        current = chosen;
    }
}

/// Generates the walk set for `target` at the given lookback
///
/// Breadth-first over the ancestors, collecting nodes whose depth is
/// exactly `target.depth + lookback`. If the frontier exhausts at the
/// genesis without collecting any, the set is just the genesis. The result
/// is padded by cyclic repetition to exactly [`WALK_COUNT`] entries.
pub fn walk_set(tangle: &Tangle, target: &Hash, lookback: u64) -> Result<Vec<Hash>> {
    let depths = tangle.depth_map()?;
    let target_depth = *depths
        .get(target)
        .ok_or(TangleError::NodeNotFound(*target))?;
    let wanted = target_depth + lookback;

    let mut queue = VecDeque::from([*target]);
    let mut seen: HashSet<Hash> = HashSet::from([*target]);
    let mut collected = Vec::new();

    while let Some(hash) = queue.pop_front() {
        if depths.get(&hash) == Some(&wanted) {
            collected.push(hash);
            continue;
        }
        let node = match tangle.find(&hash)? {
            Some(node) => node,
            None => continue,
        };
        for parent in node.parents() {
            if seen.insert(*parent) {
                queue.push_back(*parent);
            }
        }
    }

    if collected.is_empty() {
        collected.push(tangle.genesis_hash()?);
    }

    let mut out = Vec::with_capacity(WALK_COUNT);
    for i in 0..WALK_COUNT {
        out.push(collected[i % collected.len()]);
    }
    Ok(out)
}

/// Estimates how confirmed `target` is, in `[0, 1]`
///
/// Runs one biased random walk from each walk-set entry and reports the
/// fraction of terminal tips that have `target` in their past cone.
pub fn confirmation_confidence(tangle: &Tangle, target: &Hash) -> Result<f64> {
    let starts = walk_set(tangle, target, WALK_LOOKBACK)?;

    let mut approving = 0usize;
    for start in &starts {
        let tip = biased_random_walk(tangle, start, WALK_ALPHA, 0.0)?;
        if tangle.is_child(target, &tip)? {
            approving += 1;
        }
    }

    Ok(approving as f64 / starts.len() as f64)
}

/// Selects up to `count` distinct parents for a new transaction
///
/// Each candidate is found by an independent biased walk from the genesis;
/// duplicate terminals collapse, so the result holds at least one hash.
pub fn select_parents(tangle: &Tangle, count: usize) -> Result<Vec<Hash>> {
    let genesis = tangle.genesis_hash()?;
    let mut parents = Vec::new();
    for _ in 0..count.max(1) {
        let tip = biased_random_walk(tangle, &genesis, WALK_ALPHA, 0.0)?;
        if !parents.contains(&tip) {
            parents.push(tip);
        }
    }
    Ok(parents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{Output, Transaction};
    use crate::transaction_builder::{MineControl, TransactionBuilder};
    use weft_crypto::KeyPair;

    fn chain(tangle: &Tangle, kp: &KeyPair, from: Hash, len: usize) -> Vec<Hash> {
        let mut hashes = vec![from];
        for _ in 0..len {
            let tx = TransactionBuilder::new()
                .parent(*hashes.last().unwrap())
                .spend(kp, 1.0)
                .pay(kp.public_key().clone(), 1.0)
                .difficulty(1)
                .build_and_mine(&MineControl::new())
                .unwrap();
            hashes.push(tangle.add(tx).unwrap());
        }
        hashes
    }

    fn funded(kp: &KeyPair) -> Tangle {
        Tangle::new(Transaction::genesis(vec![Output {
            account: kp.public_key().clone(),
            amount: 1_000_000.0,
        }]))
        .unwrap()
    }

    #[test]
    fn test_walk_reaches_a_tip() {
        let kp = KeyPair::from_seed(&[3u8; 32]);
        let tangle = funded(&kp);
        let genesis = tangle.genesis_hash().unwrap();
        chain(&tangle, &kp, genesis, 5);

        let tips = tangle.tips().unwrap();
        for _ in 0..10 {
            let found = biased_random_walk(&tangle, &genesis, WALK_ALPHA, 0.0).unwrap();
            assert!(tips.contains(&found));
        }
    }

    #[test]
    fn test_walk_from_tip_returns_itself() {
        let kp = KeyPair::from_seed(&[3u8; 32]);
        let tangle = funded(&kp);
        let genesis = tangle.genesis_hash().unwrap();
        let hashes = chain(&tangle, &kp, genesis, 2);

        let tip = *hashes.last().unwrap();
        assert_eq!(
            biased_random_walk(&tangle, &tip, WALK_ALPHA, 0.0).unwrap(),
            tip
        );
    }

    #[test]
    fn test_walk_favors_heavier_branch() {
        let kp = KeyPair::from_seed(&[4u8; 32]);
        let tangle = funded(&kp);
        let genesis = tangle.genesis_hash().unwrap();

        // A long (heavy) branch and a single-node (light) branch
        let heavy = chain(&tangle, &kp, genesis, 6);
        let light = chain(&tangle, &kp, genesis, 1);
        tangle.update_weights().unwrap();

        let heavy_tip = *heavy.last().unwrap();
        let light_tip = *light.last().unwrap();

        let mut heavy_hits = 0;
        for _ in 0..100 {
            let found = biased_random_walk(&tangle, &genesis, WALK_ALPHA, 0.0).unwrap();
            if found == heavy_tip {
                heavy_hits += 1;
            } else {
                assert_eq!(found, light_tip);
            }
        }
        assert!(heavy_hits > 90);
    }

    #[test]
    fn test_walk_with_step_back_still_terminates() {
        let kp = KeyPair::from_seed(&[8u8; 32]);
        let tangle = funded(&kp);
        let genesis = tangle.genesis_hash().unwrap();
        chain(&tangle, &kp, genesis, 3);

        let tips = tangle.tips().unwrap();
        for _ in 0..10 {
            let found = biased_random_walk(&tangle, &genesis, WALK_ALPHA, 0.3).unwrap();
            assert!(tips.contains(&found));
        }
    }

    #[test]
    fn test_walk_set_falls_back_to_genesis() {
        let kp = KeyPair::from_seed(&[5u8; 32]);
        let tangle = funded(&kp);
        let genesis = tangle.genesis_hash().unwrap();
        let hashes = chain(&tangle, &kp, genesis, 3);

        // The graph is far shallower than the lookback
        let set = walk_set(&tangle, &hashes[2], WALK_LOOKBACK).unwrap();
        assert_eq!(set.len(), WALK_COUNT);
        assert!(set.iter().all(|h| *h == genesis));
    }

    #[test]
    fn test_walk_set_collects_exact_depth() {
        let kp = KeyPair::from_seed(&[5u8; 32]);
        let tangle = funded(&kp);
        let genesis = tangle.genesis_hash().unwrap();
        let hashes = chain(&tangle, &kp, genesis, 4);

        // Two levels behind the last node sits hashes[2]
        let set = walk_set(&tangle, &hashes[4], 2).unwrap();
        assert_eq!(set.len(), WALK_COUNT);
        assert!(set.iter().all(|h| *h == hashes[2]));
    }

    #[test]
    fn test_confidence_of_deep_node_is_full() {
        let kp = KeyPair::from_seed(&[6u8; 32]);
        let tangle = funded(&kp);
        let genesis = tangle.genesis_hash().unwrap();
        let hashes = chain(&tangle, &kp, genesis, 4);
        tangle.update_weights().unwrap();

        // Every walk ends at the single tip, which approves the whole chain
        assert_eq!(
            confirmation_confidence(&tangle, &hashes[1]).unwrap(),
            1.0
        );
        assert_eq!(confirmation_confidence(&tangle, &genesis).unwrap(), 1.0);
    }

    #[test]
    fn test_select_parents_returns_tips() {
        let kp = KeyPair::from_seed(&[7u8; 32]);
        let tangle = funded(&kp);
        let genesis = tangle.genesis_hash().unwrap();
        chain(&tangle, &kp, genesis, 2);
        chain(&tangle, &kp, genesis, 2);

        let tips = tangle.tips().unwrap();
        let parents = select_parents(&tangle, 2).unwrap();
        assert!(!parents.is_empty());
        assert!(parents.iter().all(|p| tips.contains(p)));
    }
}
