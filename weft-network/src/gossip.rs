// src/gossip.rs

//! The network-synchronized tangle.
//!
//! Wraps the local [`Tangle`] with gossip listeners: locally published
//! transactions are broadcast, remote transactions are validated and
//! inserted, transactions arriving before their parents wait in a FIFO
//! orphan queue, and newcomers receive the whole graph from any established
//! peer.
//!
//! Errors raised while handling a remote message are logged and the message
//! dropped; a peer is never disconnected over a single bad message.

use crate::errors::Result;
use crate::message::{Message, Payload};
use crate::transport::{MessageHandler, PeerId, Transport};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};
use weft_core::{AddOptions, Hash, Tangle, TangleError, Transaction};
use weft_crypto::{KeyPair, PublicKey};

/// Called when a peer's public key lands in the directory
pub type KeyRegisteredHook = Box<dyn Fn(PeerId, &PublicKey) + Send + Sync>;

/// Called after a remote transaction is successfully inserted
pub type TransactionHook = Box<dyn Fn(&Transaction) + Send + Sync>;

struct Orphan {
    transaction: Transaction,
    relaxed: bool,
}

/// A tangle kept in sync with the rest of the network
pub struct NetworkedTangle {
    tangle: Arc<Tangle>,
    transport: Arc<dyn Transport>,

    /// The local account used to answer key-sync requests
    keypair: RwLock<Option<Arc<KeyPair>>>,

    /// Directory of peer public keys, filled by key sync
    peer_keys: RwLock<HashMap<PeerId, PublicKey>>,

    /// Set after a sync request until a genesis arrives
    listening_for_genesis: AtomicBool,

    /// Transactions whose parents have not arrived yet
    orphans: Mutex<VecDeque<Orphan>>,

    key_hook: RwLock<Option<KeyRegisteredHook>>,
    transaction_hook: RwLock<Option<TransactionHook>>,
}

impl NetworkedTangle {
    /// Wraps a tangle over a transport
    pub fn new(tangle: Arc<Tangle>, transport: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new(Self {
            tangle,
            transport,
            keypair: RwLock::new(None),
            peer_keys: RwLock::new(HashMap::new()),
            listening_for_genesis: AtomicBool::new(false),
            orphans: Mutex::new(VecDeque::new()),
            key_hook: RwLock::new(None),
            transaction_hook: RwLock::new(None),
        })
    }

    /// The wrapped local tangle
    pub fn tangle(&self) -> &Arc<Tangle> {
        &self.tangle
    }

    /// The underlying transport
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Sets the personal keypair, optionally announcing it to the network
    pub fn set_key_pair(&self, keypair: Arc<KeyPair>, announce: bool) -> Result<()> {
        let public_key = keypair.public_key().clone();
        if let Ok(mut slot) = self.keypair.write() {
            *slot = Some(keypair);
        }
        if announce {
            self.transport.broadcast(&Message::new(Payload::PublicKeySyncResponse {
                public_key,
            }))?;
        }
        Ok(())
    }

    /// The personal keypair, if one is set
    pub fn personal_keys(&self) -> Option<Arc<KeyPair>> {
        self.keypair.read().ok().and_then(|k| k.clone())
    }

    /// Installs the hook invoked when a peer key is registered
    pub fn set_key_hook(&self, hook: KeyRegisteredHook) {
        if let Ok(mut slot) = self.key_hook.write() {
            *slot = Some(hook);
        }
    }

    /// Installs the hook invoked after a remote transaction is inserted
    pub fn set_transaction_hook(&self, hook: TransactionHook) {
        if let Ok(mut slot) = self.transaction_hook.write() {
            *slot = Some(hook);
        }
    }

    /// The accounts in the peer directory
    pub fn peer_accounts(&self) -> Vec<PublicKey> {
        self.peer_keys
            .read()
            .map(|keys| keys.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Every known account: peers from the directory plus our own
    pub fn known_accounts(&self) -> Vec<PublicKey> {
        let mut accounts: Vec<PublicKey> = self.peer_accounts();
        if let Some(keypair) = self.personal_keys() {
            accounts.push(keypair.public_key().clone());
        }
        accounts
    }

    /// The directory entry for one peer
    pub fn peer_key(&self, peer: &PeerId) -> Option<PublicKey> {
        self.peer_keys.read().ok().and_then(|k| k.get(peer).cloned())
    }

    /// Resolves an account hash to a known public key
    ///
    /// Transaction creation refuses unknown targets; this is where that
    /// rule is enforced.
    ///
    /// # Errors
    /// `InvalidAccount` if no directory entry (nor our own key) matches.
    pub fn find_account(&self, account_hash: &str) -> Result<PublicKey> {
        for account in self.known_accounts() {
            if account.account_hash() == account_hash {
                return Ok(account);
            }
        }
        Err(TangleError::InvalidAccount(account_hash.to_string()).into())
    }

    /// Number of transactions waiting for their parents
    pub fn orphan_count(&self) -> usize {
        self.orphans.lock().map(|q| q.len()).unwrap_or(0)
    }

    /// Whether this node is waiting for a genesis from a sync
    pub fn is_listening_for_genesis(&self) -> bool {
        self.listening_for_genesis.load(Ordering::Relaxed)
    }

    /// Adds a locally created transaction and gossips it to every peer
    pub fn publish(&self, transaction: Transaction) -> Result<Hash> {
        // The local add validates everything; only an accepted transaction
        // reaches the network.
        let hash = self.tangle.add(transaction.clone())?;
        self.transport
            .broadcast(&Message::new(Payload::AddTransactionRequest { transaction }))?;
        Ok(hash)
    }

    /// Asks every recipient to announce its public key
    pub fn request_keys(&self) -> Result<()> {
        self.transport
            .broadcast(&Message::new(Payload::PublicKeySyncRequest))
    }

    /// Asks the network for its graph and waits for a genesis
    pub fn request_sync(&self) -> Result<()> {
        self.listening_for_genesis.store(true, Ordering::Relaxed);
        self.transport
            .broadcast(&Message::new(Payload::TangleSynchronizeRequest))
    }

    // -- Listeners --

    fn handle_public_key_sync_request(&self) -> Result<()> {
        if let Some(keypair) = self.personal_keys() {
            self.transport.broadcast(&Message::new(Payload::PublicKeySyncResponse {
                public_key: keypair.public_key().clone(),
            }))?;
        }
        Ok(())
    }

    fn handle_public_key_sync_response(&self, from: PeerId, public_key: PublicKey) -> Result<()> {
        info!(
            "Registered key `{}` for peer {}",
            public_key.account_hash(),
            hex::encode(from)
        );
        if let Ok(mut keys) = self.peer_keys.write() {
            keys.insert(from, public_key.clone());
        }
        if let Ok(hook) = self.key_hook.read() {
            if let Some(hook) = hook.as_ref() {
                hook(from, &public_key);
            }
        }
        Ok(())
    }

    /// Streams the whole graph to the requester, parents before children
    fn handle_tangle_synchronize_request(&self, from: PeerId) -> Result<()> {
        let nodes = self.tangle.list_transactions()?;
        for node in &nodes {
            let transaction = node.transaction().clone();
            let payload = if node.is_genesis() {
                Payload::SyncGenesisRequest {
                    genesis: transaction,
                }
            } else {
                Payload::SynchronizationAddTransactionRequest { transaction }
            };
            self.transport.send_to(&from, &Message::new(payload))?;
        }
        info!("Sent tangle ({} nodes) to {}", nodes.len(), hex::encode(from));
        Ok(())
    }

    fn handle_sync_genesis(&self, genesis: Transaction) -> Result<()> {
        // Nothing to do if we already root here
        if self.tangle.genesis_hash()? == genesis.hash {
            return Ok(());
        }
        // Only a node that asked for a sync accepts a new genesis
        if !self.listening_for_genesis.load(Ordering::Relaxed) {
            return Ok(());
        }

        let hash = genesis.hash;
        self.tangle.set_genesis(genesis)?;
        self.listening_for_genesis.store(false, Ordering::Relaxed);
        info!(
            "Synchronized new genesis with hash `{}`",
            weft_core::types::hash_to_hex(&hash)
        );
        Ok(())
    }

    fn handle_add_transaction(&self, transaction: Transaction, relaxed: bool) -> Result<()> {
        self.attempt_add(transaction, relaxed)
    }

    fn handle_update_weights(&self) -> Result<()> {
        self.tangle.update_weights()?;
        Ok(())
    }

    /// Inserts a remote transaction, or queues it while parents are missing
    fn attempt_add(&self, transaction: Transaction, relaxed: bool) -> Result<()> {
        let hash = transaction.hash;
        if self.tangle.contains(&hash)? {
            debug!(
                "Dropping already-known transaction `{}`",
                weft_core::types::hash_to_hex(&hash)
            );
            return Ok(());
        }

        let mut parents_found = true;
        for parent in &transaction.parents {
            if !self.tangle.contains(parent)? {
                parents_found = false;
                break;
            }
        }

        if !parents_found {
            debug!(
                "Transaction `{}` is temporarily orphaned, enqueueing for later",
                weft_core::types::hash_to_hex(&hash)
            );
            if let Ok(mut orphans) = self.orphans.lock() {
                orphans.push_back(Orphan {
                    transaction,
                    relaxed,
                });
            }
            return Ok(());
        }

        self.insert(transaction, relaxed)?;
        self.drain_orphans()?;
        Ok(())
    }

    fn insert(&self, transaction: Transaction, relaxed: bool) -> Result<()> {
        let hash = transaction.hash;
        self.tangle.add_with(
            transaction.clone(),
            AddOptions {
                // Bulk sync replays history in an order that would trip
                // balance checks; difficulty and signatures still apply.
                check_balance: !relaxed,
                update_weights: true,
            },
        )?;
        debug!(
            "Added remote transaction `{}` to the tangle",
            weft_core::types::hash_to_hex(&hash)
        );

        // The hook only observes live traffic; a bulk sync replaying a
        // newcomer's history must not trigger it.
        if !relaxed {
            if let Ok(hook) = self.transaction_hook.read() {
                if let Some(hook) = hook.as_ref() {
                    hook(&transaction);
                }
            }
        }
        Ok(())
    }

    /// One bounded pass over the orphan queue
    ///
    /// Only the items present when the pass starts are retried; anything
    /// enqueued during the pass waits for the next successful insertion.
    fn drain_orphans(&self) -> Result<()> {
        let pass_len = self.orphan_count();
        for _ in 0..pass_len {
            let orphan = match self.orphans.lock() {
                Ok(mut orphans) => match orphans.pop_front() {
                    Some(orphan) => orphan,
                    None => return Ok(()),
                },
                Err(_) => return Ok(()),
            };

            let mut parents_found = true;
            for parent in &orphan.transaction.parents {
                if !self.tangle.contains(parent)? {
                    parents_found = false;
                    break;
                }
            }

            if !parents_found {
                if let Ok(mut orphans) = self.orphans.lock() {
                    orphans.push_back(orphan);
                }
                continue;
            }

            if let Err(e) = self.insert(orphan.transaction, orphan.relaxed) {
                // Parents arrived but validation failed; the orphan is
                // invalid, not stale, so it does not go back in the queue.
                warn!("Discarding invalid orphan: {}", e);
            }
        }
        Ok(())
    }
}

impl MessageHandler for NetworkedTangle {
    fn on_message(&self, from: PeerId, message: Message) {
        if let Err(e) = message.verify() {
            warn!(
                "Dropping {} from {}: {}",
                message.payload.type_name(),
                hex::encode(from),
                e
            );
            return;
        }

        let name = message.payload.type_name();
        let result = match message.payload {
            Payload::PublicKeySyncRequest => self.handle_public_key_sync_request(),
            Payload::PublicKeySyncResponse { public_key } => {
                self.handle_public_key_sync_response(from, public_key)
            }
            Payload::TangleSynchronizeRequest => self.handle_tangle_synchronize_request(from),
            Payload::SyncGenesisRequest { genesis } => self.handle_sync_genesis(genesis),
            Payload::SynchronizationAddTransactionRequest { transaction } => {
                self.handle_add_transaction(transaction, true)
            }
            Payload::AddTransactionRequest { transaction } => {
                self.handle_add_transaction(transaction, false)
            }
            Payload::UpdateWeightsRequest => self.handle_update_weights(),
        };

        if let Err(e) = result {
            warn!("Dropping {} from {}: {}", name, hex::encode(from), e);
        }
    }

    fn on_peer_connected(&self, peer: PeerId) {
        info!("{} connected!", hex::encode(peer));
    }

    fn on_peer_disconnected(&self, peer: PeerId) {
        info!("{} disconnected", hex::encode(peer));
    }
}
