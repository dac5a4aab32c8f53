//! Transport layer
//!
//! WebSocket connections and the hub task that serializes all signaling work.

pub mod hub;
pub mod signaling_server;

pub use hub::{HubCommand, HubHandle, SignalingHub};
pub use signaling_server::handle_signaling_connection;
