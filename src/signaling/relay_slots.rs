//! Relay slots
//!
//! Two process-wide relay roles shared by every room. The primary slot is
//! last-writer-wins; the secondary slot is first-writer-wins and can only be
//! taken again after its holder disconnects.

use super::{ConnectionId, SignalingError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayRole {
    Primary,
    Secondary,
}

impl RelayRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayRole::Primary => "primary",
            RelayRole::Secondary => "secondary",
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct RelaySlots {
    primary: Option<ConnectionId>,
    secondary: Option<ConnectionId>,
}

impl RelaySlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the primary slot, returning the connection it replaced
    pub fn declare_primary(&mut self, connection: ConnectionId) -> Option<ConnectionId> {
        self.primary.replace(connection)
    }

    /// Take the secondary slot if it is empty. Re-declaring by the holder is a no-op.
    pub fn declare_secondary(&mut self, connection: ConnectionId) -> Result<(), SignalingError> {
        match self.secondary {
            None => {
                self.secondary = Some(connection);
                Ok(())
            }
            Some(holder) if holder == connection => Ok(()),
            Some(_) => Err(SignalingError::Conflict(
                "secondary relay is already declared".to_string(),
            )),
        }
    }

    pub fn primary(&self) -> Result<ConnectionId, SignalingError> {
        self.primary
            .ok_or_else(|| SignalingError::NotReady("no primary relay declared".to_string()))
    }

    pub fn secondary(&self) -> Result<ConnectionId, SignalingError> {
        self.secondary
            .ok_or_else(|| SignalingError::NotReady("no secondary relay declared".to_string()))
    }

    pub fn has_secondary(&self) -> bool {
        self.secondary.is_some()
    }

    /// Free every slot held by a closing connection
    pub fn release(&mut self, connection: ConnectionId) -> Vec<RelayRole> {
        let mut released = Vec::new();
        if self.primary == Some(connection) {
            self.primary = None;
            released.push(RelayRole::Primary);
        }
        if self.secondary == Some(connection) {
            self.secondary = None;
            released.push(RelayRole::Secondary);
        }
        released
    }

    /// Roles held by `connection`
    pub fn roles_of(&self, connection: ConnectionId) -> Vec<RelayRole> {
        let mut roles = Vec::new();
        if self.primary == Some(connection) {
            roles.push(RelayRole::Primary);
        }
        if self.secondary == Some(connection) {
            roles.push(RelayRole::Secondary);
        }
        roles
    }
}
