// src/node.rs

//! The running node: tangle, gossip, handshake listener, faucet, auto-ping.

use crate::config::NodeConfig;
use crate::errors::{NodeError, Result};
use crate::{FAUCET_DIFFICULTY, FAUCET_GRANT, PING_DIFFICULTY};
use rand::seq::SliceRandom;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use weft_core::{
    walk, Hash, MineControl, Output, Tangle, Transaction, TransactionBuilder,
};
use weft_crypto::{KeyPair, PublicKey};
use weft_network::{handshake, NetworkedTangle, TcpNetwork, Transport};

/// How long deferred startup actions (key announce, sync request) wait
const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// A running weft node
pub struct WeftNode {
    config: NodeConfig,
    tangle: Arc<Tangle>,
    network: Arc<TcpNetwork>,
    gossip: Arc<NetworkedTangle>,
    handshake_running: Arc<AtomicBool>,
    handshake_port: u16,
    auto_ping: Arc<AtomicBool>,
}

impl WeftNode {
    /// Establishes a fresh network with this node as its first member
    ///
    /// Installs a genesis granting a throwaway network key effectively
    /// unlimited funds, then acts as a faucet: every newly announced
    /// account with a zero balance receives a grant, our own included.
    pub fn host(config: NodeConfig, personal: KeyPair) -> Result<Arc<Self>> {
        let network_keys = Arc::new(KeyPair::generate());
        let genesis = Transaction::genesis(vec![Output {
            account: network_keys.public_key().clone(),
            amount: f64::MAX,
        }]);

        let node = Self::start(config, personal.clone(), genesis)?;
        info!(
            "Established a network on port {}",
            node.network.local_port()
        );

        // The faucet: grant every newly announced, empty account
        {
            let gossip = Arc::downgrade(&node.gossip);
            let network_keys = Arc::clone(&network_keys);
            node.gossip.set_key_hook(Box::new(move |_peer, key| {
                let gossip = gossip.clone();
                let network_keys = Arc::clone(&network_keys);
                let key = key.clone();
                std::thread::spawn(move || {
                    std::thread::sleep(SETTLE_DELAY);
                    if let Some(gossip) = gossip.upgrade() {
                        faucet_grant(&gossip, &network_keys, &key);
                    }
                });
            }));
        }

        // Send ourselves a million
        {
            let gossip = Arc::downgrade(&node.gossip);
            let own_key = personal.public_key().clone();
            std::thread::spawn(move || {
                if let Some(gossip) = gossip.upgrade() {
                    info!("Sending us a million money!");
                    faucet_grant(&gossip, &network_keys, &own_key);
                }
            });
        }

        Ok(node)
    }

    /// Joins an existing network at `target`
    ///
    /// Discovers the remote gossip port over the handshake sidechannel,
    /// connects, announces the personal key, and asks for the whole graph.
    pub fn join(config: NodeConfig, personal: KeyPair, target: IpAddr) -> Result<Arc<Self>> {
        let remote_gossip = handshake::discover(target, config.remote_handshake_port)?;

        // A placeholder root; the sync replaces it
        let genesis = Transaction::genesis(Vec::new());
        let node = Self::start(config, personal, genesis)?;

        node.network
            .connect(SocketAddr::new(target, remote_gossip))?;
        info!(
            "Connected to the network (listening on port {})",
            node.network.local_port()
        );

        // Give the connection a moment, then announce ourselves and ask for
        // everyone's keys and the graph
        {
            let gossip = Arc::downgrade(&node.gossip);
            std::thread::spawn(move || {
                std::thread::sleep(SETTLE_DELAY);
                let gossip = match gossip.upgrade() {
                    Some(gossip) => gossip,
                    None => return,
                };
                if let Some(keys) = gossip.personal_keys() {
                    if let Err(e) = gossip.set_key_pair(keys, true) {
                        warn!("Key announcement failed: {}", e);
                    }
                }
                if let Err(e) = gossip.request_keys() {
                    warn!("Key sync request failed: {}", e);
                }
                std::thread::sleep(SETTLE_DELAY);
                if let Err(e) = gossip.request_sync() {
                    warn!("Tangle sync request failed: {}", e);
                }
            });
        }

        Ok(node)
    }

    /// Shared startup: transport, gossip wiring, handshake, auto-ping hook
    fn start(config: NodeConfig, personal: KeyPair, genesis: Transaction) -> Result<Arc<Self>> {
        let network = TcpNetwork::establish(config.gossip_port)?;
        let tangle = Arc::new(Tangle::new(genesis)?);
        let gossip = NetworkedTangle::new(Arc::clone(&tangle), network.clone() as Arc<dyn Transport>);
        network.set_handler(gossip.clone());
        gossip.set_key_pair(Arc::new(personal), false)?;

        let handshake_running = Arc::new(AtomicBool::new(true));
        let (handshake_port, _listener) = handshake::serve(
            config.handshake_port,
            network.local_port(),
            Arc::clone(&handshake_running),
        )?;
        info!("Started handshake listener on port {}", handshake_port);

        let auto_ping = Arc::new(AtomicBool::new(false));
        install_ping_hook(&gossip, &auto_ping);

        Ok(Arc::new(Self {
            config,
            tangle,
            network,
            gossip,
            handshake_running,
            handshake_port,
            auto_ping,
        }))
    }

    /// The local tangle
    pub fn tangle(&self) -> &Arc<Tangle> {
        &self.tangle
    }

    /// The gossip layer
    pub fn gossip(&self) -> &Arc<NetworkedTangle> {
        &self.gossip
    }

    /// The node configuration
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The bound handshake port
    pub fn handshake_port(&self) -> u16 {
        self.handshake_port
    }

    /// The personal account hash, if a keypair is set
    pub fn account_hash(&self) -> Option<String> {
        self.gossip
            .personal_keys()
            .map(|keys| keys.public_key().account_hash())
    }

    /// Creates, mines, and publishes a transfer to a known account
    pub fn transact(&self, account_hash: &str, amount: f64, difficulty: u8) -> Result<Hash> {
        let personal = self.gossip.personal_keys().ok_or(NodeError::NoKeys)?;
        let target = self.gossip.find_account(account_hash)?;
        let parents = walk::select_parents(&self.tangle, 2)?;

        let tx = TransactionBuilder::new()
            .parents(parents)
            .spend(&personal, amount)
            .pay(target, amount)
            .difficulty(difficulty)
            .build_and_mine(&MineControl::new())?;

        Ok(self.gossip.publish(tx)?)
    }

    /// A random known peer account, if any
    pub fn random_account(&self) -> Option<String> {
        let accounts = self.gossip.peer_accounts();
        accounts
            .choose(&mut rand::thread_rng())
            .map(PublicKey::account_hash)
    }

    /// Personal balances at the 0%, 50%, and 95% confidence levels
    pub fn balances(&self) -> Result<(f64, f64, f64)> {
        let personal = self.gossip.personal_keys().ok_or(NodeError::NoKeys)?;
        let key = personal.public_key();
        Ok((
            self.tangle.query_balance(key, 0.0)?,
            self.tangle.query_balance(key, 0.5)?,
            self.tangle.query_balance(key, 0.95)?,
        ))
    }

    /// Walks from the genesis to a tip and reports what it found
    pub fn random_walk_demo(&self) -> Result<(usize, Hash, bool)> {
        let tip_count = self.tangle.tips()?.len();
        let genesis = self.tangle.genesis_hash()?;
        let found = walk::biased_random_walk(&self.tangle, &genesis, weft_core::WALK_ALPHA, 0.0)?;
        let approves = self.tangle.is_child(&genesis, &found)?;
        Ok((tip_count, found, approves))
    }

    /// Multi-line dump of the whole graph
    pub fn debug_dump(&self) -> Result<String> {
        let tips = self.tangle.tips()?;
        let mut out = String::new();
        for node in self.tangle.list_transactions()? {
            let hash = node.hash();
            let marker = if tips.contains(&hash) { " (tip)" } else { "" };
            out.push_str(&format!(
                "{}{} weight={:.2} parents={:?}\n",
                weft_core::types::hash_to_hex(&hash),
                marker,
                node.cumulative_weight()?,
                node.parents()
                    .iter()
                    .map(|p| weft_core::types::hash_to_hex(p)[..8].to_string())
                    .collect::<Vec<_>>(),
            ));
        }
        Ok(out)
    }

    /// Detailed dump of one transaction
    pub fn dump_transaction(&self, hash: &Hash) -> Result<Option<String>> {
        Ok(self
            .tangle
            .find(hash)?
            .map(|node| format!("{:#?}", node.transaction())))
    }

    /// Saves the tangle to a file
    pub fn save_tangle(&self, path: &str) -> Result<()> {
        let mut file = std::fs::File::create(path)?;
        self.tangle.save_tangle(&mut file)?;
        Ok(())
    }

    /// Loads the tangle from a file, replacing the local graph
    pub fn load_tangle(&self, path: &str) -> Result<()> {
        let len = std::fs::metadata(path)?.len();
        let mut file = std::fs::File::open(path)?;
        self.tangle.load_tangle(&mut file, len)?;
        Ok(())
    }

    /// Generates a fresh personal keypair and announces it
    pub fn generate_keys(&self) -> Result<String> {
        let keys = KeyPair::generate();
        let hash = keys.public_key().account_hash();
        self.gossip.set_key_pair(Arc::new(keys), true)?;
        Ok(hash)
    }

    /// Saves the personal keypair to a key file
    pub fn save_keys(&self, path: &str) -> Result<()> {
        let keys = self.gossip.personal_keys().ok_or(NodeError::NoKeys)?;
        weft_wallet::save_key_file(&keys, path)?;
        Ok(())
    }

    /// Loads a personal keypair from a key file and announces it
    pub fn load_keys(&self, path: &str) -> Result<String> {
        let keys = weft_wallet::load_key_file(path)?;
        let hash = keys.public_key().account_hash();
        self.gossip.set_key_pair(Arc::new(keys), true)?;
        Ok(hash)
    }

    /// Flips the auto-ping toggle, returning the new state
    pub fn toggle_auto_ping(&self) -> bool {
        let was = self.auto_ping.fetch_xor(true, Ordering::Relaxed);
        !was
    }

    /// Forces a full cumulative-weight recomputation
    pub fn force_weight_update(&self) -> Result<()> {
        self.tangle.update_weights()?;
        Ok(())
    }

    /// Flips the should-run flags and disconnects the transport
    pub fn shutdown(&self) {
        if self.handshake_running.swap(false, Ordering::Relaxed) {
            info!("Stopped handshake listener");
        }
        self.network.disconnect();
    }
}

/// Grants the faucet amount to `target` if its balance is still zero
fn faucet_grant(gossip: &NetworkedTangle, network_keys: &KeyPair, target: &PublicKey) {
    let tangle = gossip.tangle();
    let grant = || -> Result<()> {
        if tangle.query_balance(target, 0.0)? != 0.0 {
            return Ok(());
        }
        info!(
            "Sending `{}` a million money!",
            target.account_hash()
        );
        let parents = walk::select_parents(tangle, 2)?;
        let tx = TransactionBuilder::new()
            .parents(parents)
            .spend(network_keys, FAUCET_GRANT)
            .pay(target.clone(), FAUCET_GRANT)
            .difficulty(FAUCET_DIFFICULTY)
            .build_and_mine(&MineControl::new())?;
        gossip.publish(tx)?;
        Ok(())
    };
    if let Err(e) = grant() {
        warn!("Faucet grant failed: {}", e);
    }
}

/// After each received transaction, optionally bounce the amount onward
fn install_ping_hook(gossip: &Arc<NetworkedTangle>, auto_ping: &Arc<AtomicBool>) {
    let weak = Arc::downgrade(gossip);
    let auto_ping = Arc::clone(auto_ping);
    let in_flight = Arc::new(AtomicUsize::new(0));

    gossip.set_transaction_hook(Box::new(move |tx: &Transaction| {
        if !auto_ping.load(Ordering::Relaxed) {
            return;
        }
        // At most one ping in flight
        if in_flight.load(Ordering::Relaxed) >= 1 {
            return;
        }

        let received = tx.output_total();
        let hash = tx.hash;
        let weak = weak.clone();
        let in_flight = Arc::clone(&in_flight);

        in_flight.fetch_add(1, Ordering::Relaxed);
        std::thread::spawn(move || {
            std::thread::sleep(SETTLE_DELAY);
            if let Some(gossip) = weak.upgrade() {
                if let Err(e) = ping_once(&gossip, received, &hash) {
                    warn!("Ping failed: {}", e);
                }
            }
            in_flight.fetch_sub(1, Ordering::Relaxed);
        });
    }));
}

fn ping_once(gossip: &NetworkedTangle, amount: f64, trigger: &Hash) -> Result<()> {
    let tangle = gossip.tangle();
    // Only ping amounts that actually settled
    if !tangle.contains(trigger)? {
        return Ok(());
    }
    let personal = gossip.personal_keys().ok_or(NodeError::NoKeys)?;
    let accounts = gossip.peer_accounts();
    let target = match accounts.choose(&mut rand::thread_rng()) {
        Some(target) => target.clone(),
        None => return Ok(()),
    };

    info!("Pinging {} money", amount);
    let parents = walk::select_parents(tangle, 2)?;
    let tx = TransactionBuilder::new()
        .parents(parents)
        .spend(&personal, amount)
        .pay(target, amount)
        .difficulty(PING_DIFFICULTY)
        .build_and_mine(&MineControl::new())?;
    gossip.publish(tx)?;
    Ok(())
}
