//! Room membership state.
//!
//! A room pairs two maps that must stay consistent: peer-to-username and
//! username-to-public-key. Both mutate together in a single call, under
//! whatever lock guards the room.

use std::collections::HashMap;

use thiserror::Error;

use crate::peer::{PeerHandle, PeerId};

/// Registration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegisterError {
    /// The username is already held by another member of the room.
    #[error("username taken in this room")]
    UsernameTaken,
}

/// One registered member.
#[derive(Debug)]
struct RoomMember {
    username: String,
    handle: PeerHandle,
}

/// Membership and key material for one room id.
#[derive(Debug, Default)]
pub struct Room {
    /// Members keyed by connection identity.
    members: HashMap<PeerId, RoomMember>,
    /// Public keys keyed by username; a username appears here iff it is
    /// registered in `members`.
    public_keys: HashMap<String, String>,
}

impl Room {
    /// Create an empty room.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of members.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Check if the room has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Check if a username is registered.
    #[must_use]
    pub fn contains_username(&self, username: &str) -> bool {
        self.public_keys.contains_key(username)
    }

    /// Get the public key registered for `username`.
    #[must_use]
    pub fn public_key(&self, username: &str) -> Option<&str> {
        self.public_keys.get(username).map(String::as_str)
    }

    /// Register a peer under `username`.
    ///
    /// Both maps update in the same call; on a collision nothing mutates
    /// and the caller must refuse the join.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::UsernameTaken`] if the username is held.
    pub fn register(
        &mut self,
        handle: PeerHandle,
        username: &str,
        public_key: &str,
    ) -> Result<(), RegisterError> {
        if self.public_keys.contains_key(username) {
            return Err(RegisterError::UsernameTaken);
        }

        self.public_keys
            .insert(username.to_string(), public_key.to_string());
        self.members.insert(
            handle.id(),
            RoomMember {
                username: username.to_string(),
                handle,
            },
        );
        Ok(())
    }

    /// Remove a peer and its key material.
    ///
    /// Returns the username the peer was registered under; an unknown peer
    /// is a no-op returning `None`.
    pub fn deregister(&mut self, peer: PeerId) -> Option<String> {
        let member = self.members.remove(&peer)?;
        self.public_keys.remove(&member.username);
        Some(member.username)
    }

    /// Handles of all members except `exclude`.
    #[must_use]
    pub fn handles(&self, exclude: Option<PeerId>) -> Vec<PeerHandle> {
        self.members
            .values()
            .filter(|m| Some(m.handle.id()) != exclude)
            .map(|m| m.handle.clone())
            .collect()
    }

    /// Handle of the member registered under `username`, if any.
    #[must_use]
    pub fn handle_of(&self, username: &str) -> Option<PeerHandle> {
        self.members
            .values()
            .find(|m| m.username == username)
            .map(|m| m.handle.clone())
    }

    /// `(username, public key)` pairs for every member except `exclude`.
    #[must_use]
    pub fn key_entries(&self, exclude: &str) -> Vec<(String, String)> {
        self.public_keys
            .iter()
            .filter(|(name, _)| name.as_str() != exclude)
            .map(|(name, key)| (name.clone(), key.clone()))
            .collect()
    }
}
