// src/handshake.rs

//! Sidechannel port discovery.
//!
//! A client opens TCP to the handshake port; the server writes its gossip
//! port as two bytes little-endian and closes. This is the only NAT help
//! the protocol offers.

use crate::errors::{NetworkError, Result};
use crate::ACCEPT_POLL_INTERVAL_MS;
use std::io::{ErrorKind, Read, Write};
use std::net::{IpAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long a discovery client waits for the two port bytes
pub const DISCOVERY_TIMEOUT_SECS: u64 = 5;

/// Starts the handshake listener thread
///
/// Binds `listen_port` (0 for ephemeral) and answers every connection with
/// `gossip_port`. The thread exits when `should_run` goes false.
///
/// # Returns
/// The bound handshake port and the listener thread handle.
pub fn serve(
    listen_port: u16,
    gossip_port: u16,
    should_run: Arc<AtomicBool>,
) -> Result<(u16, JoinHandle<()>)> {
    let listener = TcpListener::bind(("0.0.0.0", listen_port))?;
    let bound_port = listener.local_addr()?.port();
    listener.set_nonblocking(true)?;

    let handle = thread::spawn(move || {
        while should_run.load(Ordering::Relaxed) {
            match listener.accept() {
                Ok((mut stream, address)) => {
                    debug!("Answering handshake from {}", address);
                    if let Err(e) = stream.write_all(&gossip_port.to_le_bytes()) {
                        warn!("Handshake write to {} failed: {}", address, e);
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(ACCEPT_POLL_INTERVAL_MS));
                }
                Err(e) => {
                    warn!("Handshake accept failed: {}", e);
                    break;
                }
            }
        }
        info!("Stopped handshake listener");
    });

    Ok((bound_port, handle))
}

/// Asks a remote handshake service for its gossip port
pub fn discover(address: IpAddr, handshake_port: u16) -> Result<u16> {
    let mut stream = TcpStream::connect((address, handshake_port))
        .map_err(|e| NetworkError::HandshakeError(format!("{}: {}", address, e)))?;
    stream.set_read_timeout(Some(Duration::from_secs(DISCOVERY_TIMEOUT_SECS)))?;

    let mut port_bytes = [0u8; 2];
    stream
        .read_exact(&mut port_bytes)
        .map_err(|e| NetworkError::HandshakeError(format!("Short handshake read: {}", e)))?;
    Ok(u16::from_le_bytes(port_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_round_trip() {
        let should_run = Arc::new(AtomicBool::new(true));
        let (port, handle) = serve(0, 4801, Arc::clone(&should_run)).unwrap();

        let discovered = discover("127.0.0.1".parse().unwrap(), port).unwrap();
        assert_eq!(discovered, 4801);

        should_run.store(false, Ordering::Relaxed);
        handle.join().unwrap();
    }

    #[test]
    fn test_discover_unreachable_port_fails() {
        // Port 1 is essentially never listening
        let result = discover("127.0.0.1".parse().unwrap(), 1);
        assert!(matches!(result, Err(NetworkError::HandshakeError(_))));
    }
}
