// src/transport.rs

//! Broadcast transport over plain TCP.
//!
//! The core consumes the [`Transport`] trait only; this module also ships
//! the reference implementation: length-prefixed bincode frames over TCP,
//! one reader thread per peer, and an accept loop governed by a should-run
//! flag. No cooperative async anywhere - everything is parallel OS threads
//! over shared memory.

use crate::errors::{NetworkError, Result};
use crate::message::Message;
use crate::{ACCEPT_POLL_INTERVAL_MS, MAX_MESSAGE_SIZE};
use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};
use weft_crypto::hash::sha256;

/// Local identifier of a connected peer
pub type PeerId = [u8; 32];

/// Receives messages and connection events from a transport
pub trait MessageHandler: Send + Sync {
    /// A verified frame arrived from `from`
    fn on_message(&self, from: PeerId, message: Message);

    /// A peer connected
    fn on_peer_connected(&self, _peer: PeerId) {}

    /// A peer disconnected
    fn on_peer_disconnected(&self, _peer: PeerId) {}
}

/// Typed broadcast transport with unicast to a specific peer
pub trait Transport: Send + Sync {
    /// Sends a message to every connected peer
    fn broadcast(&self, message: &Message) -> Result<()>;

    /// Sends a message to one peer
    fn send_to(&self, peer: &PeerId, message: &Message) -> Result<()>;

    /// Snapshot of the connected peer ids
    fn peer_ids(&self) -> Vec<PeerId>;

    /// Tears the transport down
    fn disconnect(&self);
}

struct PeerHandle {
    stream: Arc<Mutex<TcpStream>>,
    address: SocketAddr,
}

/// TCP reference transport
pub struct TcpNetwork {
    local_port: u16,
    should_run: Arc<AtomicBool>,
    peers: Mutex<HashMap<PeerId, PeerHandle>>,
    handler: RwLock<Option<Arc<dyn MessageHandler>>>,
    accept_thread: Mutex<Option<JoinHandle<()>>>,
}

impl TcpNetwork {
    /// Binds the gossip port and starts accepting peers
    ///
    /// Pass port 0 to bind an ephemeral port; read it back with
    /// [`TcpNetwork::local_port`].
    pub fn establish(port: u16) -> Result<Arc<Self>> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        let local_port = listener.local_addr()?.port();
        listener.set_nonblocking(true)?;

        let network = Arc::new(Self {
            local_port,
            should_run: Arc::new(AtomicBool::new(true)),
            peers: Mutex::new(HashMap::new()),
            handler: RwLock::new(None),
            accept_thread: Mutex::new(None),
        });

        let accept_network = Arc::clone(&network);
        let handle = thread::spawn(move || accept_loop(accept_network, listener));
        if let Ok(mut slot) = network.accept_thread.lock() {
            *slot = Some(handle);
        }

        info!("Listening for peers on port {}", local_port);
        Ok(network)
    }

    /// The port the accept loop is bound to
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Registers the handler that receives messages and connection events
    pub fn set_handler(&self, handler: Arc<dyn MessageHandler>) {
        if let Ok(mut slot) = self.handler.write() {
            *slot = Some(handler);
        }
    }

    /// Opens an outbound connection to a peer's gossip port
    pub fn connect(self: &Arc<Self>, address: SocketAddr) -> Result<PeerId> {
        let stream = TcpStream::connect(address)
            .map_err(|e| NetworkError::ConnectionError(format!("{}: {}", address, e)))?;
        self.register_peer(stream, address)
    }

    fn register_peer(self: &Arc<Self>, stream: TcpStream, address: SocketAddr) -> Result<PeerId> {
        let peer = peer_id_for(&address);
        let reader = stream.try_clone()?;

        {
            let mut peers = self
                .peers
                .lock()
                .map_err(|_| NetworkError::ConnectionError("Peer table poisoned".to_string()))?;
            peers.insert(
                peer,
                PeerHandle {
                    stream: Arc::new(Mutex::new(stream)),
                    address,
                },
            );
        }

        if let Some(handler) = self.handler() {
            handler.on_peer_connected(peer);
        }
        info!("Peer {} connected from {}", hex::encode(peer), address);

        let network = Arc::clone(self);
        thread::spawn(move || reader_loop(network, reader, peer));

        Ok(peer)
    }

    fn handler(&self) -> Option<Arc<dyn MessageHandler>> {
        self.handler.read().ok().and_then(|h| h.clone())
    }

    fn drop_peer(&self, peer: &PeerId) {
        let removed = self
            .peers
            .lock()
            .ok()
            .and_then(|mut peers| peers.remove(peer));
        if let Some(handle) = removed {
            debug!("Peer {} at {} dropped", hex::encode(peer), handle.address);
            if self.should_run.load(Ordering::Relaxed) {
                if let Some(handler) = self.handler() {
                    handler.on_peer_disconnected(*peer);
                }
            }
        }
    }

    fn write_to_handle(&self, handle: &PeerHandle, frame: &[u8]) -> Result<()> {
        let mut stream = handle
            .stream
            .lock()
            .map_err(|_| NetworkError::ConnectionError("Peer stream poisoned".to_string()))?;
        stream.write_all(&(frame.len() as u32).to_le_bytes())?;
        stream.write_all(frame)?;
        stream.flush()?;
        Ok(())
    }
}

impl Transport for TcpNetwork {
    fn broadcast(&self, message: &Message) -> Result<()> {
        let frame = message.to_bytes()?;
        if frame.len() > MAX_MESSAGE_SIZE {
            return Err(NetworkError::InvalidMessage(format!(
                "Message too large: {} bytes",
                frame.len()
            )));
        }

        let peers = self
            .peers
            .lock()
            .map_err(|_| NetworkError::ConnectionError("Peer table poisoned".to_string()))?;
        for (peer, handle) in peers.iter() {
            if let Err(e) = self.write_to_handle(handle, &frame) {
                warn!("Failed to send to peer {}: {}", hex::encode(peer), e);
            }
        }
        Ok(())
    }

    fn send_to(&self, peer: &PeerId, message: &Message) -> Result<()> {
        let frame = message.to_bytes()?;
        if frame.len() > MAX_MESSAGE_SIZE {
            return Err(NetworkError::InvalidMessage(format!(
                "Message too large: {} bytes",
                frame.len()
            )));
        }

        let peers = self
            .peers
            .lock()
            .map_err(|_| NetworkError::ConnectionError("Peer table poisoned".to_string()))?;
        let handle = peers
            .get(peer)
            .ok_or_else(|| NetworkError::UnknownPeer(hex::encode(peer)))?;
        self.write_to_handle(handle, &frame)
    }

    fn peer_ids(&self) -> Vec<PeerId> {
        self.peers
            .lock()
            .map(|peers| peers.keys().copied().collect())
            .unwrap_or_default()
    }

    fn disconnect(&self) {
        self.should_run.store(false, Ordering::Relaxed);

        if let Ok(mut peers) = self.peers.lock() {
            for handle in peers.values() {
                if let Ok(stream) = handle.stream.lock() {
                    let _ = stream.shutdown(Shutdown::Both);
                }
            }
            peers.clear();
        }

        if let Ok(mut slot) = self.accept_thread.lock() {
            if let Some(handle) = slot.take() {
                let _ = handle.join();
            }
        }
        info!("Disconnected from the network");
    }
}

fn accept_loop(network: Arc<TcpNetwork>, listener: TcpListener) {
    while network.should_run.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, address)) => {
                if stream.set_nonblocking(false).is_err() {
                    continue;
                }
                if let Err(e) = network.register_peer(stream, address) {
                    warn!("Failed to register peer {}: {}", address, e);
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(ACCEPT_POLL_INTERVAL_MS));
            }
            Err(e) => {
                warn!("Accept failed: {}", e);
                break;
            }
        }
    }
}

fn reader_loop(network: Arc<TcpNetwork>, mut stream: TcpStream, peer: PeerId) {
    loop {
        if !network.should_run.load(Ordering::Relaxed) {
            break;
        }
        match read_frame(&mut stream) {
            Ok(message) => {
                if let Some(handler) = network.handler() {
                    handler.on_message(peer, message);
                }
            }
            Err(e) => {
                debug!("Reader for {} stopped: {}", hex::encode(peer), e);
                break;
            }
        }
    }
    network.drop_peer(&peer);
}

fn read_frame(stream: &mut TcpStream) -> Result<Message> {
    let mut len_bytes = [0u8; 4];
    stream.read_exact(&mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes) as usize;

    if len > MAX_MESSAGE_SIZE {
        return Err(NetworkError::InvalidMessage(format!(
            "Message too large: {} bytes",
            len
        )));
    }

    let mut data = vec![0u8; len];
    stream.read_exact(&mut data)?;
    Message::from_bytes(&data)
}

/// Derives the local identifier for a peer from its socket address
fn peer_id_for(address: &SocketAddr) -> PeerId {
    sha256(address.to_string().as_bytes())
}
