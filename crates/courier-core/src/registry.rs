//! Process-wide room registry and routing.
//!
//! The registry owns every live [`Room`]. Rooms are created lazily on first
//! join and removed the moment their last member leaves. The map's
//! per-entry lock serializes each room's mutations, so resolve-or-create
//! plus registration is one atomic step and empty-room removal re-checks
//! emptiness under the same lock a racing join would take.

use courier_protocol::Envelope;
use dashmap::DashMap;
use tracing::{debug, trace};

use crate::peer::{PeerHandle, PeerId};
use crate::room::{RegisterError, Room};

/// Registry of all live rooms, keyed by room id.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, Room>,
}

impl RoomRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` in `room_id` under `username`, creating the room
    /// if this is its first member.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::UsernameTaken`] if the username is already
    /// held in the room; the room keeps its current members untouched.
    pub fn join(
        &self,
        room_id: &str,
        handle: PeerHandle,
        username: &str,
        public_key: &str,
    ) -> Result<(), RegisterError> {
        let mut room = self.rooms.entry(room_id.to_string()).or_default();
        room.register(handle, username, public_key)?;
        debug!(
            room = %room_id,
            user = %username,
            members = room.member_count(),
            "member joined"
        );
        Ok(())
    }

    /// Deregister `peer` from `room_id`, deleting the room once empty.
    ///
    /// Returns the username the peer was registered under; an unknown room
    /// or peer is a no-op returning `None`.
    pub fn leave(&self, room_id: &str, peer: PeerId) -> Option<String> {
        let (username, emptied) = {
            let mut room = self.rooms.get_mut(room_id)?;
            let username = room.deregister(peer)?;
            (username, room.is_empty())
        };

        if emptied {
            // Emptiness is re-checked under the entry lock; a join racing
            // this departure keeps the room alive.
            self.rooms.remove_if(room_id, |_, room| room.is_empty());
        }

        debug!(room = %room_id, user = %username, "member left");
        Some(username)
    }

    /// Deliver `envelope` to every member of `room_id` except `exclude`.
    ///
    /// Handles are snapshotted first and the room lock released before any
    /// delivery; each send is an independent queue push, so one slow or
    /// dead recipient cannot affect the others. An unknown or empty room
    /// is a no-op.
    pub fn broadcast(&self, room_id: &str, exclude: Option<PeerId>, envelope: &Envelope) {
        let handles = match self.rooms.get(room_id) {
            Some(room) => room.handles(exclude),
            None => return,
        };

        trace!(room = %room_id, recipients = handles.len(), "broadcast");
        for handle in handles {
            handle.send(envelope.clone());
        }
    }

    /// Deliver `envelope` to the member registered under `username`.
    ///
    /// A username not currently in the room is a silent drop; there is no
    /// store-and-forward.
    pub fn send_to_user(&self, room_id: &str, username: &str, envelope: Envelope) {
        let handle = match self.rooms.get(room_id) {
            Some(room) => room.handle_of(username),
            None => None,
        };

        if let Some(handle) = handle {
            trace!(room = %room_id, to = %username, "direct send");
            handle.send(envelope);
        }
    }

    /// `(username, public key)` pairs currently registered in `room_id`,
    /// excluding `exclude`.
    #[must_use]
    pub fn member_keys(&self, room_id: &str, exclude: &str) -> Vec<(String, String)> {
        self.rooms
            .get(room_id)
            .map(|room| room.key_entries(exclude))
            .unwrap_or_default()
    }

    /// Check if a room exists.
    #[must_use]
    pub fn contains(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Get the number of live rooms.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Get the member count of a room.
    #[must_use]
    pub fn member_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map_or(0, |room| room.member_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_protocol::EnvelopeKind;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn peer() -> (PeerHandle, UnboundedReceiver<Envelope>) {
        PeerHandle::pair()
    }

    #[test]
    fn test_join_creates_room() {
        let registry = RoomRegistry::new();
        assert!(!registry.contains("room1"));

        let (alice, _rx) = peer();
        registry.join("room1", alice, "alice", "pk-alice").unwrap();

        assert!(registry.contains("room1"));
        assert_eq!(registry.room_count(), 1);
        assert_eq!(registry.member_count("room1"), 1);
    }

    #[test]
    fn test_leave_removes_empty_room() {
        let registry = RoomRegistry::new();
        let (alice, _rx) = peer();
        let alice_id = alice.id();
        registry.join("room1", alice, "alice", "pk-alice").unwrap();

        assert_eq!(
            registry.leave("room1", alice_id),
            Some("alice".to_string())
        );
        assert!(!registry.contains("room1"));
    }

    #[test]
    fn test_leave_keeps_populated_room() {
        let registry = RoomRegistry::new();
        let (alice, _rx_a) = peer();
        let (bob, _rx_b) = peer();
        let alice_id = alice.id();
        registry.join("room1", alice, "alice", "pk-alice").unwrap();
        registry.join("room1", bob, "bob", "pk-bob").unwrap();

        registry.leave("room1", alice_id);

        assert!(registry.contains("room1"));
        assert_eq!(registry.member_count("room1"), 1);
    }

    #[test]
    fn test_leave_unknown_is_noop() {
        let registry = RoomRegistry::new();
        let (alice, _rx) = peer();

        assert!(registry.leave("nowhere", alice.id()).is_none());

        registry.join("room1", alice, "alice", "pk-alice").unwrap();
        let (stranger, _rx) = peer();
        assert!(registry.leave("room1", stranger.id()).is_none());
        assert_eq!(registry.member_count("room1"), 1);
    }

    #[test]
    fn test_same_username_in_different_rooms() {
        let registry = RoomRegistry::new();
        let (a, _rx_a) = peer();
        let (b, _rx_b) = peer();

        registry.join("room-a", a, "alice", "pk-1").unwrap();
        registry.join("room-b", b, "alice", "pk-2").unwrap();

        assert_eq!(registry.member_count("room-a"), 1);
        assert_eq!(registry.member_count("room-b"), 1);
    }

    #[test]
    fn test_collision_leaves_registry_intact() {
        let registry = RoomRegistry::new();
        let (first, _rx_1) = peer();
        let (second, _rx_2) = peer();
        registry.join("room1", first, "alice", "pk-1").unwrap();

        assert_eq!(
            registry.join("room1", second, "alice", "pk-2"),
            Err(RegisterError::UsernameTaken)
        );
        assert_eq!(registry.member_count("room1"), 1);
        assert_eq!(
            registry.member_keys("room1", ""),
            vec![("alice".to_string(), "pk-1".to_string())]
        );
    }

    #[test]
    fn test_broadcast_excludes_one() {
        let registry = RoomRegistry::new();
        let (alice, mut rx_alice) = peer();
        let (bob, mut rx_bob) = peer();
        let (carol, mut rx_carol) = peer();
        let alice_id = alice.id();
        registry.join("room1", alice, "alice", "pk-a").unwrap();
        registry.join("room1", bob, "bob", "pk-b").unwrap();
        registry.join("room1", carol, "carol", "pk-c").unwrap();

        registry.broadcast("room1", Some(alice_id), &Envelope::clear("room1"));

        assert!(rx_alice.try_recv().is_err());
        assert_eq!(rx_bob.try_recv().unwrap().kind(), EnvelopeKind::Clear);
        assert_eq!(rx_carol.try_recv().unwrap().kind(), EnvelopeKind::Clear);
    }

    #[test]
    fn test_broadcast_without_exclusion_reaches_all() {
        let registry = RoomRegistry::new();
        let (alice, mut rx_alice) = peer();
        let (bob, mut rx_bob) = peer();
        registry.join("room1", alice, "alice", "pk-a").unwrap();
        registry.join("room1", bob, "bob", "pk-b").unwrap();

        registry.broadcast("room1", None, &Envelope::clear("room1"));

        assert!(rx_alice.try_recv().is_ok());
        assert!(rx_bob.try_recv().is_ok());
    }

    #[test]
    fn test_broadcast_unknown_room_is_noop() {
        let registry = RoomRegistry::new();
        registry.broadcast("nowhere", None, &Envelope::clear("nowhere"));
    }

    #[test]
    fn test_broadcast_survives_dead_recipient() {
        let registry = RoomRegistry::new();
        let (alice, rx_alice) = peer();
        let (bob, mut rx_bob) = peer();
        registry.join("room1", alice, "alice", "pk-a").unwrap();
        registry.join("room1", bob, "bob", "pk-b").unwrap();

        // Alice's writer is gone but she has not been deregistered yet.
        drop(rx_alice);
        registry.broadcast("room1", None, &Envelope::clear("room1"));

        assert!(rx_bob.try_recv().is_ok());
    }

    #[test]
    fn test_send_to_user_targets_only_recipient() {
        let registry = RoomRegistry::new();
        let (alice, mut rx_alice) = peer();
        let (bob, mut rx_bob) = peer();
        registry.join("room1", alice, "alice", "pk-a").unwrap();
        registry.join("room1", bob, "bob", "pk-b").unwrap();

        registry.send_to_user("room1", "bob", Envelope::chat("alice", "room1", "hi"));

        let received = rx_bob.try_recv().unwrap();
        assert_eq!(received, Envelope::chat("alice", "room1", "hi"));
        assert!(rx_alice.try_recv().is_err());
    }

    #[test]
    fn test_send_to_missing_user_is_silent() {
        let registry = RoomRegistry::new();
        let (alice, mut rx_alice) = peer();
        registry.join("room1", alice, "alice", "pk-a").unwrap();

        registry.send_to_user("room1", "nobody", Envelope::chat("alice", "room1", "hi"));
        registry.send_to_user("nowhere", "alice", Envelope::chat("alice", "room1", "hi"));

        assert!(rx_alice.try_recv().is_err());
    }

    #[test]
    fn test_member_keys_excludes_requester() {
        let registry = RoomRegistry::new();
        let (alice, _rx_a) = peer();
        let (bob, _rx_b) = peer();
        registry.join("room1", alice, "alice", "pk-a").unwrap();
        registry.join("room1", bob, "bob", "pk-b").unwrap();

        let mut keys = registry.member_keys("room1", "bob");
        keys.sort();
        assert_eq!(keys, vec![("alice".to_string(), "pk-a".to_string())]);

        assert!(registry.member_keys("nowhere", "alice").is_empty());
    }

    #[test]
    fn test_rejoined_room_is_fresh() {
        let registry = RoomRegistry::new();
        let (alice, _rx_a) = peer();
        let alice_id = alice.id();
        registry.join("room1", alice, "alice", "pk-a").unwrap();
        registry.leave("room1", alice_id);

        let (bob, _rx_b) = peer();
        registry.join("room1", bob, "bob", "pk-b").unwrap();

        // No key material survives the empty interval.
        assert_eq!(
            registry.member_keys("room1", ""),
            vec![("bob".to_string(), "pk-b".to_string())]
        );
    }
}
