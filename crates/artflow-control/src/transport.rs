//! Frame transports
//!
//! A transport hands one universe frame to the network. Sends are
//! fire-and-forget: no acknowledgement, no retry, and they must never wait,
//! since they run inside the node's frame loop.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;

use crate::artnet::{build_artdmx_packet, Sequence};
use crate::{error::ControlError, Result};

/// Destination for universe frames
pub trait Transport: Send {
    /// Send `frame` as the data of `universe`
    fn send(&mut self, universe: u16, frame: &[u8]) -> Result<()>;
}

/// Art-Net over a non-blocking UDP socket
pub struct UdpTransport {
    socket: UdpSocket,
    target: SocketAddr,
    sequences: HashMap<u16, Sequence>,
}

impl UdpTransport {
    /// Create a transport sending to `host:port`
    ///
    /// # Arguments
    /// * `host` - Node IP or hostname (broadcast addresses are allowed)
    /// * `port` - Node UDP port (normally 6454)
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let target = (host, port)
            .to_socket_addrs()
            .map_err(|e| ControlError::InvalidAddress(format!("{}:{}: {}", host, port, e)))?
            .find(SocketAddr::is_ipv4)
            .ok_or_else(|| ControlError::InvalidAddress(format!("{}:{}", host, port)))?;

        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_broadcast(true)?;
        socket.set_nonblocking(true)?;

        tracing::info!("Art-Net transport created -> {}", target);

        Ok(Self {
            socket,
            target,
            sequences: HashMap::new(),
        })
    }

    /// Resolved destination
    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, universe: u16, frame: &[u8]) -> Result<()> {
        let sequence = self.sequences.entry(universe).or_default();
        let packet = build_artdmx_packet(sequence.value(), universe, frame);

        match self.socket.send_to(&packet, self.target) {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                return Err(ControlError::Transport(format!(
                    "send buffer full for universe {}",
                    universe
                )));
            }
            Err(e) => {
                return Err(ControlError::Transport(format!(
                    "universe {} -> {}: {}",
                    universe, self.target, e
                )));
            }
        }
        sequence.advance();

        tracing::trace!("Sent Art-Net DMX packet for universe {}", universe);

        Ok(())
    }
}

/// A frame captured by [`MemoryTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    pub universe: u16,
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
struct MemoryState {
    frames: Vec<SentFrame>,
    failures: usize,
}

/// Records frames instead of sending them.
///
/// Clones share the same record, so a test can keep one clone and hand
/// another to a node.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// All frames sent so far
    pub fn frames(&self) -> Vec<SentFrame> {
        self.state.lock().frames.clone()
    }

    pub fn frame_count(&self) -> usize {
        self.state.lock().frames.len()
    }

    /// Forget recorded frames
    pub fn clear(&self) {
        self.state.lock().frames.clear();
    }

    /// Make the next `count` sends fail
    pub fn fail_next(&self, count: usize) {
        self.state.lock().failures = count;
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, universe: u16, frame: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        if state.failures > 0 {
            state.failures -= 1;
            return Err(ControlError::Transport("simulated failure".to_string()));
        }
        state.frames.push(SentFrame {
            universe,
            data: frame.to_vec(),
        });
        Ok(())
    }
}
