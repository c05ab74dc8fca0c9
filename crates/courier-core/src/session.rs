//! Per-connection relay sessions.
//!
//! A [`RelaySession`] is the relay engine for one connection: it consumes
//! already-decoded envelopes and walks the `AwaitingJoin -> Active ->
//! Closed` state machine, leaving all socket plumbing to the transport
//! layer. [`RelaySession::handshake`] consumes the mandatory first
//! envelope, [`RelaySession::dispatch`] handles each subsequent one, and
//! [`RelaySession::close`] deregisters and announces the departure.

use std::sync::Arc;

use courier_protocol::Envelope;
use thiserror::Error;
use tracing::{debug, warn};

use crate::peer::{PeerHandle, PeerId};
use crate::registry::RoomRegistry;
use crate::room::RegisterError;

/// Why a handshake was refused. Every variant is fatal to the connection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandshakeError {
    /// The first envelope was not a `join`.
    #[error("expected a join envelope")]
    NotJoin,

    /// The `join` omitted a required field.
    #[error("join is missing {0}")]
    MissingField(&'static str),

    /// The username is already held in the target room.
    #[error("username taken in this room")]
    UsernameTaken,
}

/// Verdict of [`RelaySession::dispatch`] for one inbound envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading from the connection.
    Continue,
    /// Stop reading and run cleanup.
    Close,
}

/// Room membership held by an active session.
#[derive(Debug)]
struct Membership {
    room_id: String,
    username: String,
}

/// The relay engine for one connection.
pub struct RelaySession {
    registry: Arc<RoomRegistry>,
    peer: PeerHandle,
    membership: Option<Membership>,
    closed: bool,
}

impl RelaySession {
    /// Create a session in the awaiting-join state.
    #[must_use]
    pub fn new(registry: Arc<RoomRegistry>, peer: PeerHandle) -> Self {
        Self {
            registry,
            peer,
            membership: None,
            closed: false,
        }
    }

    /// Get the connection's identity.
    #[must_use]
    pub fn peer_id(&self) -> PeerId {
        self.peer.id()
    }

    /// Username this connection registered under, once joined.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.membership.as_ref().map(|m| m.username.as_str())
    }

    /// Room this connection joined, once joined.
    #[must_use]
    pub fn room_id(&self) -> Option<&str> {
        self.membership.as_ref().map(|m| m.room_id.as_str())
    }

    /// Consume the mandatory first envelope.
    ///
    /// Only a `join` carrying `from`, `roomId`, and `publicKey` is
    /// accepted; the single-shot handshake has no retries. On a username
    /// collision the offending peer is sent an `error` envelope before the
    /// refusal is returned, and the existing holder of the name is
    /// untouched. The caller closes the connection on every error.
    ///
    /// On success the rest of the room is sent a `join` announcement
    /// (excluding the joiner) and the joiner is sent one `pubkey` envelope
    /// per existing member, both queued before any further inbound
    /// envelope can be dispatched.
    ///
    /// # Errors
    ///
    /// Returns a [`HandshakeError`] describing the refusal.
    pub fn handshake(&mut self, envelope: Envelope) -> Result<(), HandshakeError> {
        let (from, room_id, public_key) = match envelope {
            Envelope::Join {
                from,
                room_id,
                public_key,
            } => (from, room_id, public_key),
            _ => return Err(HandshakeError::NotJoin),
        };

        if from.is_empty() {
            return Err(HandshakeError::MissingField("from"));
        }
        if room_id.is_empty() {
            return Err(HandshakeError::MissingField("roomId"));
        }
        if public_key.is_empty() {
            return Err(HandshakeError::MissingField("publicKey"));
        }

        match self
            .registry
            .join(&room_id, self.peer.clone(), &from, &public_key)
        {
            Ok(()) => {}
            Err(RegisterError::UsernameTaken) => {
                warn!(room = %room_id, user = %from, "join refused, username taken");
                self.peer
                    .send(Envelope::error("username taken in this room"));
                return Err(HandshakeError::UsernameTaken);
            }
        }

        // Announce to the rest of the room, then prime the joiner with
        // every key already present. The joiner is excluded from the
        // announcement, so it never receives its own key back.
        self.registry.broadcast(
            &room_id,
            Some(self.peer.id()),
            &Envelope::join(from.clone(), room_id.clone(), public_key),
        );
        for (name, key) in self.registry.member_keys(&room_id, &from) {
            self.peer.send(Envelope::pubkey(name, room_id.clone(), key));
        }

        debug!(peer = %self.peer.id(), room = %room_id, user = %from, "session active");
        self.membership = Some(Membership {
            room_id,
            username: from,
        });
        Ok(())
    }

    /// Handle one inbound envelope while active.
    ///
    /// `chat` is routed to its addressee with `from` rewritten to the
    /// authenticated username; `clear` is broadcast to the whole room. Any
    /// other type, including a second `join`, closes the connection.
    pub fn dispatch(&mut self, envelope: Envelope) -> Flow {
        let Some(membership) = &self.membership else {
            return Flow::Close;
        };

        match envelope {
            Envelope::Chat { to, payload, .. } => {
                // Inbound `from` is untrusted and replaced with the name
                // this connection registered under. A chat without an
                // addressee or payload is dropped, not fatal.
                if !to.is_empty() && !payload.is_empty() {
                    self.registry.send_to_user(
                        &membership.room_id,
                        &to,
                        Envelope::chat(
                            membership.username.clone(),
                            membership.room_id.clone(),
                            payload,
                        ),
                    );
                }
                Flow::Continue
            }
            Envelope::Clear { .. } => {
                self.registry.broadcast(
                    &membership.room_id,
                    None,
                    &Envelope::clear(membership.room_id.clone()),
                );
                Flow::Continue
            }
            other => {
                debug!(
                    peer = %self.peer.id(),
                    user = %membership.username,
                    kind = ?other.kind(),
                    "unexpected envelope, closing"
                );
                Flow::Close
            }
        }
    }

    /// Deregister from the room and announce the departure to the
    /// remaining members.
    ///
    /// Idempotent and safe from any state: a session that never joined
    /// mutates nothing, and repeated calls are no-ops.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let Some(membership) = self.membership.take() else {
            return;
        };

        if let Some(username) = self.registry.leave(&membership.room_id, self.peer.id()) {
            self.registry
                .broadcast(&membership.room_id, None, &Envelope::leave(username));
        }
    }
}

impl Drop for RelaySession {
    fn drop(&mut self) {
        self.close();
    }
}
