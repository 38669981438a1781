//! An in-memory [`DuplexSocket`] pair, so the protocol/RPC test suites
//! don't have to bind real TCP or Unix sockets to exercise reconnection,
//! pause/resume and chunked-frame scenarios.

use std::sync::Arc;

use bytes::Bytes;
use eh_wire::{CloseReason, DuplexSocket, SocketEvent, WireError};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 1024;

/// One end of an in-memory duplex pipe. Build a connected pair with
/// [`InMemorySocketPair::connected`].
pub struct InMemorySocket {
    own_inbound: broadcast::Sender<SocketEvent>,
    peer_inbound: broadcast::Sender<SocketEvent>,
}

impl InMemorySocket {
    /// Simulate the peer vanishing without an orderly `end()` — the
    /// transport-level equivalent of a yanked network cable.
    pub fn simulate_drop(&self) {
        let _ = self
            .own_inbound
            .send(SocketEvent::Close(CloseReason::Error("connection reset".to_owned())));
    }
}

impl DuplexSocket for InMemorySocket {
    fn subscribe(&self) -> broadcast::Receiver<SocketEvent> {
        self.own_inbound.subscribe()
    }

    async fn write(&self, bytes: Bytes) -> Result<(), WireError> {
        // No receivers (peer reader not yet constructed, or already
        // dropped) is not an I/O error for this transport.
        let _ = self.peer_inbound.send(SocketEvent::Data(bytes));
        Ok(())
    }

    async fn end(&self) -> Result<(), WireError> {
        let _ = self.peer_inbound.send(SocketEvent::End);
        Ok(())
    }

    fn start_receiving(&self) {}
}

/// Constructs connected [`InMemorySocket`] pairs for tests.
pub struct InMemorySocketPair;

impl InMemorySocketPair {
    #[must_use]
    pub fn connected() -> (Arc<InMemorySocket>, Arc<InMemorySocket>) {
        let (a_inbound, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (b_inbound, _) = broadcast::channel(CHANNEL_CAPACITY);
        let a = Arc::new(InMemorySocket {
            own_inbound: a_inbound.clone(),
            peer_inbound: b_inbound.clone(),
        });
        let b = Arc::new(InMemorySocket {
            own_inbound: b_inbound,
            peer_inbound: a_inbound,
        });
        (a, b)
    }
}
