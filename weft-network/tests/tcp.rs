//! Two real nodes over TCP loopback.

use std::sync::Arc;
use std::time::{Duration, Instant};
use weft_core::{MineControl, Output, Tangle, Transaction, TransactionBuilder};
use weft_network::{NetworkedTangle, TcpNetwork, Transport};
use weft_crypto::KeyPair;

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met within 10s");
        std::thread::sleep(Duration::from_millis(25));
    }
}

fn node_with(genesis: Transaction) -> (Arc<Tangle>, Arc<TcpNetwork>, Arc<NetworkedTangle>) {
    let tangle = Arc::new(Tangle::new(genesis).unwrap());
    let network = TcpNetwork::establish(0).unwrap();
    let gossip = NetworkedTangle::new(Arc::clone(&tangle), network.clone() as Arc<dyn Transport>);
    network.set_handler(gossip.clone());
    (tangle, network, gossip)
}

#[test]
fn transaction_gossips_between_nodes() {
    let ka = KeyPair::from_seed(&[1u8; 32]);
    let kb = KeyPair::from_seed(&[2u8; 32]);

    let genesis = Transaction::genesis(vec![Output {
        account: ka.public_key().clone(),
        amount: 1_000.0,
    }]);

    let (tangle_a, network_a, _gossip_a) = node_with(genesis.clone());
    let (tangle_b, network_b, gossip_b) = node_with(genesis);

    network_b
        .connect(format!("127.0.0.1:{}", network_a.local_port()).parse().unwrap())
        .unwrap();
    wait_until(|| !network_a.peer_ids().is_empty());

    let tx = TransactionBuilder::new()
        .parent(tangle_b.genesis_hash().unwrap())
        .spend(&ka, 100.0)
        .pay(kb.public_key().clone(), 100.0)
        .difficulty(1)
        .build_and_mine(&MineControl::new())
        .unwrap();
    let hash = gossip_b.publish(tx).unwrap();

    wait_until(|| tangle_a.contains(&hash).unwrap());
    assert_eq!(
        tangle_a.query_balance(kb.public_key(), 0.0).unwrap(),
        100.0
    );

    network_a.disconnect();
    network_b.disconnect();
}

#[test]
fn newcomer_syncs_the_whole_graph() {
    let ka = KeyPair::from_seed(&[3u8; 32]);
    let kb = KeyPair::from_seed(&[4u8; 32]);

    // An established node with history
    let genesis = Transaction::genesis(vec![Output {
        account: ka.public_key().clone(),
        amount: 1_000_000.0,
    }]);
    let (tangle_a, network_a, _gossip_a) = node_with(genesis);

    let mut parent = tangle_a.genesis_hash().unwrap();
    for _ in 0..3 {
        let tx = TransactionBuilder::new()
            .parent(parent)
            .spend(&ka, 50.0)
            .pay(kb.public_key().clone(), 50.0)
            .difficulty(1)
            .build_and_mine(&MineControl::new())
            .unwrap();
        parent = tangle_a.add(tx).unwrap();
    }

    // A newcomer rooted elsewhere
    let foreign = Transaction::genesis(vec![Output {
        account: kb.public_key().clone(),
        amount: 1.0,
    }]);
    let (tangle_b, network_b, gossip_b) = node_with(foreign);

    network_b
        .connect(format!("127.0.0.1:{}", network_a.local_port()).parse().unwrap())
        .unwrap();
    wait_until(|| !network_a.peer_ids().is_empty());

    gossip_b.request_sync().unwrap();

    wait_until(|| tangle_b.len().unwrap() == tangle_a.len().unwrap());
    assert_eq!(
        tangle_b.genesis_hash().unwrap(),
        tangle_a.genesis_hash().unwrap()
    );
    assert_eq!(
        tangle_b.query_balance(kb.public_key(), 0.0).unwrap(),
        150.0
    );

    network_a.disconnect();
    network_b.disconnect();
}
