//! Peer connection handles.
//!
//! A [`PeerHandle`] is the sending side of one connection's outbound queue.
//! The queue is drained by that connection's writer task, so a push never
//! blocks on a slow socket and routing code never waits on I/O.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use courier_protocol::Envelope;
use tokio::sync::mpsc;

/// Atomic counter backing [`PeerId`] allocation.
static PEER_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one peer connection.
///
/// Equality is by connection, never by username.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(u64);

impl PeerId {
    /// Allocate the next peer id.
    #[must_use]
    pub fn next() -> Self {
        Self(PEER_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// Sending handle for one peer connection.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    id: PeerId,
    outbound: mpsc::UnboundedSender<Envelope>,
}

impl PeerHandle {
    /// Create a handle plus the receiving end its writer task drains.
    #[must_use]
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        (
            Self {
                id: PeerId::next(),
                outbound,
            },
            rx,
        )
    }

    /// Get the peer's identity.
    #[must_use]
    pub fn id(&self) -> PeerId {
        self.id
    }

    /// Queue an envelope for delivery.
    ///
    /// A closed peer drops the envelope silently; detecting the disconnect
    /// is the job of that peer's own read loop, not its senders.
    pub fn send(&self, envelope: Envelope) {
        let _ = self.outbound.send(envelope);
    }

    /// Whether the receiving side has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_ids_unique() {
        let (a, _rx_a) = PeerHandle::pair();
        let (b, _rx_b) = PeerHandle::pair();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_send_delivers() {
        let (peer, mut rx) = PeerHandle::pair();
        peer.send(Envelope::leave("alice"));

        assert_eq!(rx.try_recv().unwrap(), Envelope::leave("alice"));
    }

    #[test]
    fn test_send_after_close_is_swallowed() {
        let (peer, rx) = PeerHandle::pair();
        drop(rx);

        assert!(peer.is_closed());
        // Must not panic.
        peer.send(Envelope::clear("room1"));
    }
}
