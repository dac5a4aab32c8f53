//! Signaling core
//!
//! Pure, I/O-free state for the relay-mediated WebRTC signaling exchange:
//! - Connection registry (user id <-> connection)
//! - Room table (ordered peer indices per room)
//! - Relay slots (primary / secondary relay connections)
//! - Message router (tag -> handler dispatch)

pub mod protocol;
pub mod registry;
pub mod relay_slots;
pub mod rooms;
pub mod router;

pub use protocol::{ClientFrame, ErrorKind, ServerFrame};
pub use registry::ConnectionRegistry;
pub use relay_slots::{RelayRole, RelaySlots};
pub use rooms::RoomTable;
pub use router::{Outbound, Router};

use std::error::Error;
use std::fmt;
use uuid::Uuid;

/// Process-local handle for one live transport connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Signaling errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalingError {
    /// Room, peer index, or user id lookup failed
    NotFound(String),
    /// A relay slot was required but nobody has declared it
    NotReady(String),
    /// Frame failed to parse or is missing required fields
    MalformedFrame(String),
    /// Relay declaration without the configured token
    Unauthorized(String),
    /// Secondary relay slot already held by another connection
    Conflict(String),
    /// Resolved target connection is no longer open
    TargetUnreachable(String),
}

impl SignalingError {
    /// Wire kind reported back to the sender, `None` when the error is only logged
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            SignalingError::NotFound(_) => Some(ErrorKind::NotFound),
            SignalingError::NotReady(_) => Some(ErrorKind::NotReady),
            SignalingError::MalformedFrame(_) => Some(ErrorKind::MalformedFrame),
            SignalingError::Unauthorized(_) => Some(ErrorKind::Unauthorized),
            SignalingError::Conflict(_) => Some(ErrorKind::Conflict),
            SignalingError::TargetUnreachable(_) => None,
        }
    }

    /// Short label used for metrics
    pub fn label(&self) -> &'static str {
        match self {
            SignalingError::NotFound(_) => "not_found",
            SignalingError::NotReady(_) => "not_ready",
            SignalingError::MalformedFrame(_) => "malformed_frame",
            SignalingError::Unauthorized(_) => "unauthorized",
            SignalingError::Conflict(_) => "conflict",
            SignalingError::TargetUnreachable(_) => "target_unreachable",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            SignalingError::NotFound(msg)
            | SignalingError::NotReady(msg)
            | SignalingError::MalformedFrame(msg)
            | SignalingError::Unauthorized(msg)
            | SignalingError::Conflict(msg)
            | SignalingError::TargetUnreachable(msg) => msg,
        }
    }
}

impl fmt::Display for SignalingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalingError::NotFound(msg) => write!(f, "Not found: {}", msg),
            SignalingError::NotReady(msg) => write!(f, "Relay not ready: {}", msg),
            SignalingError::MalformedFrame(msg) => write!(f, "Malformed frame: {}", msg),
            SignalingError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            SignalingError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            SignalingError::TargetUnreachable(msg) => write!(f, "Target unreachable: {}", msg),
        }
    }
}

impl Error for SignalingError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_is_never_reported() {
        let err = SignalingError::TargetUnreachable("gone".to_string());
        assert_eq!(err.kind(), None);
        assert_eq!(
            SignalingError::NotReady("x".to_string()).kind(),
            Some(ErrorKind::NotReady)
        );
    }

    #[test]
    fn connection_ids_are_distinct() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }
}
