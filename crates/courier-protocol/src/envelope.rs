//! Envelope types for the Courier protocol.
//!
//! Envelopes are the unit of exchange between clients and the relay.
//! Each envelope is a JSON object tagged by its `type` field; string
//! fields that are absent on the wire decode as empty, and empty fields
//! are omitted when encoding.

use serde::{Deserialize, Serialize};

/// Envelope type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    Join,
    Leave,
    Pubkey,
    Chat,
    Clear,
    Error,
}

/// A protocol envelope.
///
/// The relay treats `payload` and `public_key` as opaque strings; clients
/// encrypt payloads end-to-end before they ever reach the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Envelope {
    /// Room membership request (client to server) or announcement of a new
    /// member (server to peers).
    #[serde(rename = "join")]
    Join {
        /// Username joining the room.
        #[serde(default, skip_serializing_if = "String::is_empty")]
        from: String,
        /// Target room identifier.
        #[serde(rename = "roomId", default, skip_serializing_if = "String::is_empty")]
        room_id: String,
        /// The joiner's public-key material, opaque to the relay.
        #[serde(rename = "publicKey", default, skip_serializing_if = "String::is_empty")]
        public_key: String,
    },

    /// Announcement that a member left the room.
    #[serde(rename = "leave")]
    Leave {
        /// Username that departed.
        #[serde(default, skip_serializing_if = "String::is_empty")]
        from: String,
    },

    /// Replay of an existing member's key material to a new joiner.
    #[serde(rename = "pubkey")]
    Pubkey {
        /// Username the key belongs to.
        #[serde(default, skip_serializing_if = "String::is_empty")]
        from: String,
        /// Room the key was registered in.
        #[serde(rename = "roomId", default, skip_serializing_if = "String::is_empty")]
        room_id: String,
        /// The member's public-key material.
        #[serde(rename = "publicKey", default, skip_serializing_if = "String::is_empty")]
        public_key: String,
    },

    /// An opaque payload addressed to one member of the sender's room.
    ///
    /// Inbound, `to` names the recipient and `from` is ignored; outbound,
    /// `from` carries the authenticated sender and `to` is omitted.
    #[serde(rename = "chat")]
    Chat {
        #[serde(default, skip_serializing_if = "String::is_empty")]
        from: String,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        to: String,
        #[serde(rename = "roomId", default, skip_serializing_if = "String::is_empty")]
        room_id: String,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        payload: String,
    },

    /// Request (inbound) or signal (outbound) to drop displayed history.
    #[serde(rename = "clear")]
    Clear {
        #[serde(rename = "roomId", default, skip_serializing_if = "String::is_empty")]
        room_id: String,
    },

    /// Structured refusal sent before the server closes a connection.
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        message: String,
    },
}

impl Envelope {
    /// Get the envelope kind.
    #[must_use]
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Envelope::Join { .. } => EnvelopeKind::Join,
            Envelope::Leave { .. } => EnvelopeKind::Leave,
            Envelope::Pubkey { .. } => EnvelopeKind::Pubkey,
            Envelope::Chat { .. } => EnvelopeKind::Chat,
            Envelope::Clear { .. } => EnvelopeKind::Clear,
            Envelope::Error { .. } => EnvelopeKind::Error,
        }
    }

    /// Create a join envelope.
    #[must_use]
    pub fn join(
        from: impl Into<String>,
        room_id: impl Into<String>,
        public_key: impl Into<String>,
    ) -> Self {
        Envelope::Join {
            from: from.into(),
            room_id: room_id.into(),
            public_key: public_key.into(),
        }
    }

    /// Create a leave announcement.
    #[must_use]
    pub fn leave(from: impl Into<String>) -> Self {
        Envelope::Leave { from: from.into() }
    }

    /// Create a pubkey replay envelope.
    #[must_use]
    pub fn pubkey(
        from: impl Into<String>,
        room_id: impl Into<String>,
        public_key: impl Into<String>,
    ) -> Self {
        Envelope::Pubkey {
            from: from.into(),
            room_id: room_id.into(),
            public_key: public_key.into(),
        }
    }

    /// Create an outbound chat envelope carrying the authenticated sender.
    #[must_use]
    pub fn chat(
        from: impl Into<String>,
        room_id: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Envelope::Chat {
            from: from.into(),
            to: String::new(),
            room_id: room_id.into(),
            payload: payload.into(),
        }
    }

    /// Create an inbound-style chat envelope addressed to `to`.
    #[must_use]
    pub fn chat_to(to: impl Into<String>, payload: impl Into<String>) -> Self {
        Envelope::Chat {
            from: String::new(),
            to: to.into(),
            room_id: String::new(),
            payload: payload.into(),
        }
    }

    /// Create a clear envelope.
    #[must_use]
    pub fn clear(room_id: impl Into<String>) -> Self {
        Envelope::Clear {
            room_id: room_id.into(),
        }
    }

    /// Create an error envelope.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Envelope::Error {
            message: message.into(),
        }
    }
}
