//! RustyRelay is a WebSocket signaling relay for WebRTC peers on a local network.
//!
//! It provides one binary:
//! - `signaling_relay`: accepts WebSocket clients, places them in a room and
//!   forwards every signaling message (offer, answer, ICE candidate) to the other
//!   members, keeping a security audit trail of what was exposed on the way.
//!
//! The crate is structured into several modules, each responsible for a specific
//! part of the relay.

/// Security audit trail of relayed signaling messages.
pub mod audit;
/// Handles configuration loading and management.
pub mod config;
/// Logging utilities for the application.
pub mod log;
/// Rooms, sessions and the relay server.
pub mod relay;
/// Small shared helpers.
mod utils;
/// RFC 6455 handshake and frame codec.
pub mod websocket;
