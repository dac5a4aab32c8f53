//! campus-signal - WebRTC signaling relay
//!
//! Relays offer/answer/ICE frames between room participants and up to two
//! declared relay connections over WebSocket.

pub mod config;
pub mod metrics;
pub mod signaling;
pub mod transport;
pub mod web;

// Re-exports
pub use config::Config;
pub use signaling::{ClientFrame, ConnectionId, Router, ServerFrame, SignalingError};
pub use transport::{HubHandle, SignalingHub};
pub use web::SharedState;
