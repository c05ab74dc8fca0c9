//! # courier-core
//!
//! Room registry, routing, and relay sessions for the Courier relay.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **PeerHandle** - Send half of one connection's outbound queue
//! - **Room** - Membership and key material for one room id
//! - **RoomRegistry** - All live rooms plus broadcast/direct-send routing
//! - **RelaySession** - Per-connection join/relay/cleanup state machine
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ RelaySession │────▶│ RoomRegistry │────▶│     Room     │
//! └──────────────┘     └──────────────┘     └──────────────┘
//!        │                                         │
//!        ▼                                         ▼
//! ┌──────────────┐                          ┌──────────────┐
//! │   Envelope   │                          │  PeerHandle  │
//! └──────────────┘                          └──────────────┘
//! ```
//!
//! Nothing in this crate performs I/O: a session consumes decoded
//! envelopes and deliveries are pushes onto per-peer queues, so the whole
//! state machine is testable with in-memory channels.

pub mod peer;
pub mod registry;
pub mod room;
pub mod session;

pub use peer::{PeerHandle, PeerId};
pub use registry::RoomRegistry;
pub use room::{RegisterError, Room};
pub use session::{Flow, HandshakeError, RelaySession};
