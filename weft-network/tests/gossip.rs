//! Gossip listener behavior over a recording transport.

use std::sync::{Arc, Mutex};
use weft_core::{
    Hash, MineControl, Output, Tangle, Transaction, TransactionBuilder,
};
use weft_network::{Message, MessageHandler, NetworkedTangle, Payload, PeerId, Transport};
use weft_crypto::KeyPair;

/// Transport that records every outgoing message instead of sending it
#[derive(Default)]
struct RecordingTransport {
    messages: Mutex<Vec<(Option<PeerId>, Message)>>,
}

impl RecordingTransport {
    fn take(&self) -> Vec<(Option<PeerId>, Message)> {
        std::mem::take(&mut self.messages.lock().unwrap())
    }
}

impl Transport for RecordingTransport {
    fn broadcast(&self, message: &Message) -> weft_network::Result<()> {
        self.messages.lock().unwrap().push((None, message.clone()));
        Ok(())
    }

    fn send_to(&self, peer: &PeerId, message: &Message) -> weft_network::Result<()> {
        self.messages
            .lock()
            .unwrap()
            .push((Some(*peer), message.clone()));
        Ok(())
    }

    fn peer_ids(&self) -> Vec<PeerId> {
        Vec::new()
    }

    fn disconnect(&self) {}
}

fn funded_tangle(kp: &KeyPair, amount: f64) -> Arc<Tangle> {
    Arc::new(
        Tangle::new(Transaction::genesis(vec![Output {
            account: kp.public_key().clone(),
            amount,
        }]))
        .unwrap(),
    )
}

fn transfer(from: &KeyPair, to: &KeyPair, amount: f64, parents: Vec<Hash>) -> Transaction {
    TransactionBuilder::new()
        .parents(parents)
        .spend(from, amount)
        .pay(to.public_key().clone(), amount)
        .difficulty(1)
        .build_and_mine(&MineControl::new())
        .unwrap()
}

fn add_request(transaction: Transaction) -> Message {
    Message::new(Payload::AddTransactionRequest { transaction })
}

const PEER: PeerId = [7u8; 32];

#[test]
fn orphan_is_queued_then_resolved() {
    let ka = KeyPair::from_seed(&[1u8; 32]);
    let kb = KeyPair::from_seed(&[2u8; 32]);

    let tangle = funded_tangle(&ka, 1_000.0);
    let genesis = tangle.genesis_hash().unwrap();
    let gossip = NetworkedTangle::new(Arc::clone(&tangle), Arc::new(RecordingTransport::default()));

    let tx1 = transfer(&ka, &kb, 100.0, vec![genesis]);
    let tx2 = transfer(&kb, &ka, 50.0, vec![tx1.hash]);

    // tx2 arrives first: queued, not an error
    gossip.on_message(PEER, add_request(tx2.clone()));
    assert_eq!(gossip.orphan_count(), 1);
    assert_eq!(tangle.len().unwrap(), 1);

    // tx1 arrives: both end up in the graph, the queue empties
    gossip.on_message(PEER, add_request(tx1.clone()));
    assert_eq!(gossip.orphan_count(), 0);
    assert_eq!(tangle.len().unwrap(), 3);
    assert!(tangle.contains(&tx1.hash).unwrap());
    assert!(tangle.contains(&tx2.hash).unwrap());
}

#[test]
fn tampered_message_is_dropped() {
    let ka = KeyPair::from_seed(&[1u8; 32]);
    let kb = KeyPair::from_seed(&[2u8; 32]);

    let tangle = funded_tangle(&ka, 1_000.0);
    let genesis = tangle.genesis_hash().unwrap();
    let gossip = NetworkedTangle::new(Arc::clone(&tangle), Arc::new(RecordingTransport::default()));

    let mut message = add_request(transfer(&ka, &kb, 10.0, vec![genesis]));
    message.validity_hash[0] ^= 0xff;

    gossip.on_message(PEER, message);
    assert_eq!(tangle.len().unwrap(), 1);
    assert_eq!(gossip.orphan_count(), 0);
}

#[test]
fn duplicate_transaction_is_silently_dropped() {
    let ka = KeyPair::from_seed(&[1u8; 32]);
    let kb = KeyPair::from_seed(&[2u8; 32]);

    let tangle = funded_tangle(&ka, 1_000.0);
    let genesis = tangle.genesis_hash().unwrap();
    let gossip = NetworkedTangle::new(Arc::clone(&tangle), Arc::new(RecordingTransport::default()));

    let tx = transfer(&ka, &kb, 10.0, vec![genesis]);
    gossip.on_message(PEER, add_request(tx.clone()));
    gossip.on_message(PEER, add_request(tx));

    assert_eq!(tangle.len().unwrap(), 2);
}

#[test]
fn overdraft_from_the_network_is_rejected() {
    let ka = KeyPair::from_seed(&[1u8; 32]);
    let kb = KeyPair::from_seed(&[2u8; 32]);

    let tangle = funded_tangle(&ka, 1_000.0);
    let genesis = tangle.genesis_hash().unwrap();
    let gossip = NetworkedTangle::new(Arc::clone(&tangle), Arc::new(RecordingTransport::default()));

    gossip.on_message(PEER, add_request(transfer(&ka, &kb, 5_000.0, vec![genesis])));
    assert_eq!(tangle.len().unwrap(), 1);
}

#[test]
fn publish_broadcasts_an_add_request() {
    let ka = KeyPair::from_seed(&[1u8; 32]);
    let kb = KeyPair::from_seed(&[2u8; 32]);

    let tangle = funded_tangle(&ka, 1_000.0);
    let genesis = tangle.genesis_hash().unwrap();
    let transport = Arc::new(RecordingTransport::default());
    let gossip = NetworkedTangle::new(Arc::clone(&tangle), transport.clone());

    let tx = transfer(&ka, &kb, 25.0, vec![genesis]);
    let hash = gossip.publish(tx).unwrap();

    assert!(tangle.contains(&hash).unwrap());
    let sent = transport.take();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].0.is_none());
    match &sent[0].1.payload {
        Payload::AddTransactionRequest { transaction } => assert_eq!(transaction.hash, hash),
        other => panic!("expected AddTransactionRequest, got {}", other.type_name()),
    }
}

#[test]
fn full_sync_transfers_the_whole_graph() {
    let ka = KeyPair::from_seed(&[1u8; 32]);
    let kb = KeyPair::from_seed(&[2u8; 32]);

    // An established node with some history
    let tangle_a = funded_tangle(&ka, 1_000_000.0);
    let genesis = tangle_a.genesis_hash().unwrap();
    let transport_a = Arc::new(RecordingTransport::default());
    let gossip_a = NetworkedTangle::new(Arc::clone(&tangle_a), transport_a.clone());

    let mut parent = genesis;
    for _ in 0..4 {
        let tx = transfer(&ka, &kb, 100.0, vec![parent]);
        parent = tangle_a.add(tx).unwrap();
    }

    // A newcomer rooted somewhere else entirely
    let tangle_b = funded_tangle(&kb, 5.0);
    let transport_b = Arc::new(RecordingTransport::default());
    let gossip_b = NetworkedTangle::new(Arc::clone(&tangle_b), transport_b.clone());

    const PEER_A: PeerId = [1u8; 32];
    const PEER_B: PeerId = [2u8; 32];

    gossip_b.request_sync().unwrap();
    assert!(gossip_b.is_listening_for_genesis());
    let requests = transport_b.take();
    assert_eq!(requests.len(), 1);

    // The established node answers by streaming its graph to the requester
    gossip_a.on_message(PEER_B, requests[0].1.clone());
    let stream = transport_a.take();
    assert_eq!(stream.len(), 5);
    assert!(stream.iter().all(|(to, _)| *to == Some(PEER_B)));
    assert!(matches!(
        stream[0].1.payload,
        Payload::SyncGenesisRequest { .. }
    ));

    for (_, message) in stream {
        gossip_b.on_message(PEER_A, message);
    }

    assert!(!gossip_b.is_listening_for_genesis());
    assert_eq!(tangle_b.genesis_hash().unwrap(), genesis);
    assert_eq!(tangle_b.len().unwrap(), tangle_a.len().unwrap());
    assert_eq!(
        tangle_b.query_balance(kb.public_key(), 0.0).unwrap(),
        400.0
    );
}

#[test]
fn genesis_is_ignored_unless_requested() {
    let ka = KeyPair::from_seed(&[1u8; 32]);
    let kb = KeyPair::from_seed(&[2u8; 32]);

    let tangle = funded_tangle(&ka, 1_000.0);
    let original = tangle.genesis_hash().unwrap();
    let gossip = NetworkedTangle::new(Arc::clone(&tangle), Arc::new(RecordingTransport::default()));

    let foreign = Transaction::genesis(vec![Output {
        account: kb.public_key().clone(),
        amount: 123.0,
    }]);
    gossip.on_message(PEER, Message::new(Payload::SyncGenesisRequest { genesis: foreign }));

    assert_eq!(tangle.genesis_hash().unwrap(), original);
}

#[test]
fn key_directory_records_peer_keys() {
    let ka = KeyPair::from_seed(&[1u8; 32]);
    let kb = KeyPair::from_seed(&[2u8; 32]);

    let tangle = funded_tangle(&ka, 1_000.0);
    let gossip = NetworkedTangle::new(Arc::clone(&tangle), Arc::new(RecordingTransport::default()));

    let registered = Arc::new(Mutex::new(Vec::new()));
    {
        let registered = Arc::clone(&registered);
        gossip.set_key_hook(Box::new(move |peer, key| {
            registered.lock().unwrap().push((peer, key.clone()));
        }));
    }

    assert!(gossip.find_account(&kb.public_key().account_hash()).is_err());

    gossip.on_message(
        PEER,
        Message::new(Payload::PublicKeySyncResponse {
            public_key: kb.public_key().clone(),
        }),
    );

    let found = gossip.find_account(&kb.public_key().account_hash()).unwrap();
    assert_eq!(&found, kb.public_key());
    assert_eq!(gossip.peer_key(&PEER), Some(kb.public_key().clone()));
    assert_eq!(registered.lock().unwrap().len(), 1);
}

#[test]
fn transaction_hook_ignores_sync_replay() {
    let ka = KeyPair::from_seed(&[1u8; 32]);
    let kb = KeyPair::from_seed(&[2u8; 32]);

    let tangle = funded_tangle(&ka, 1_000.0);
    let genesis = tangle.genesis_hash().unwrap();
    let gossip = NetworkedTangle::new(Arc::clone(&tangle), Arc::new(RecordingTransport::default()));

    let observed = Arc::new(Mutex::new(Vec::new()));
    {
        let observed = Arc::clone(&observed);
        gossip.set_transaction_hook(Box::new(move |tx| {
            observed.lock().unwrap().push(tx.hash);
        }));
    }

    // Historical replay must not trigger the hook
    let synced = transfer(&ka, &kb, 10.0, vec![genesis]);
    gossip.on_message(
        PEER,
        Message::new(Payload::SynchronizationAddTransactionRequest {
            transaction: synced.clone(),
        }),
    );
    assert!(tangle.contains(&synced.hash).unwrap());
    assert!(observed.lock().unwrap().is_empty());

    // Live gossip does
    let live = transfer(&ka, &kb, 10.0, vec![synced.hash]);
    gossip.on_message(PEER, add_request(live.clone()));
    assert_eq!(*observed.lock().unwrap(), vec![live.hash]);
}

#[test]
fn key_sync_request_is_answered_with_own_key() {
    let ka = KeyPair::from_seed(&[1u8; 32]);

    let tangle = funded_tangle(&ka, 1_000.0);
    let transport = Arc::new(RecordingTransport::default());
    let gossip = NetworkedTangle::new(Arc::clone(&tangle), transport.clone());
    gossip.set_key_pair(Arc::new(ka.clone()), false).unwrap();
    transport.take();

    gossip.on_message(PEER, Message::new(Payload::PublicKeySyncRequest));

    let sent = transport.take();
    assert_eq!(sent.len(), 1);
    match &sent[0].1.payload {
        Payload::PublicKeySyncResponse { public_key } => {
            assert_eq!(public_key, ka.public_key())
        }
        other => panic!("expected PublicKeySyncResponse, got {}", other.type_name()),
    }
}

#[test]
fn update_weights_message_runs_a_full_pass() {
    let ka = KeyPair::from_seed(&[1u8; 32]);

    let tangle = funded_tangle(&ka, 1_000.0);
    let genesis = tangle.genesis_hash().unwrap();
    let gossip = NetworkedTangle::new(Arc::clone(&tangle), Arc::new(RecordingTransport::default()));

    let tx = transfer(&ka, &ka, 1.0, vec![genesis]);
    let hash = tangle.add(tx).unwrap();

    gossip.on_message(PEER, Message::new(Payload::UpdateWeightsRequest));

    let node = tangle.find(&hash).unwrap().unwrap();
    assert_eq!(node.cumulative_weight().unwrap(), node.own_weight());
    let root = tangle.genesis().unwrap();
    assert!(root.cumulative_weight().unwrap() >= node.own_weight());
}
