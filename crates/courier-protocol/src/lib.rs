//! # courier-protocol
//!
//! Wire protocol definitions for the Courier relay.
//!
//! This crate defines the JSON envelopes exchanged between Courier clients
//! and the relay, and the codec that moves them on and off the wire.
//!
//! ## Envelope Types
//!
//! - `join` / `leave` - Room membership and announcements
//! - `pubkey` - Key replay to a new joiner
//! - `chat` - Opaque payload addressed to one member
//! - `clear` / `error` - History reset and structured refusals
//!
//! ## Example
//!
//! ```rust
//! use courier_protocol::{codec, Envelope};
//!
//! let envelope = Envelope::join("alice", "lobby", "pk-alice");
//!
//! let encoded = codec::encode(&envelope).unwrap();
//! let decoded = codec::decode_str(&encoded).unwrap();
//! assert_eq!(envelope, decoded);
//! ```

pub mod codec;
pub mod envelope;

pub use codec::{decode, decode_str, encode, ProtocolError};
pub use envelope::{Envelope, EnvelopeKind};
