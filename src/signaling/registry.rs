//! Connection registry: user id <-> live connection, both directions.

use super::ConnectionId;
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct ConnectionRegistry {
    by_user: HashMap<String, ConnectionId>,
    by_connection: HashMap<ConnectionId, String>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `user_id` with `connection`. Last write wins in both
    /// directions: a previous connection of this user loses its identity, and
    /// a previous identity of this connection is forgotten.
    pub fn register(&mut self, user_id: &str, connection: ConnectionId) {
        if let Some(previous_user) = self.by_connection.remove(&connection) {
            if previous_user != user_id && self.by_user.get(&previous_user) == Some(&connection) {
                self.by_user.remove(&previous_user);
            }
        }

        if let Some(previous_connection) = self.by_user.insert(user_id.to_string(), connection) {
            if previous_connection != connection {
                self.by_connection.remove(&previous_connection);
            }
        }

        self.by_connection.insert(connection, user_id.to_string());
    }

    pub fn lookup_connection(&self, user_id: &str) -> Option<ConnectionId> {
        self.by_user.get(user_id).copied()
    }

    pub fn lookup_user_id(&self, connection: ConnectionId) -> Option<&str> {
        self.by_connection.get(&connection).map(String::as_str)
    }

    /// Drop both entries of a closing connection, returning the user id it owned
    pub fn remove(&mut self, connection: ConnectionId) -> Option<String> {
        let user_id = self.by_connection.remove(&connection)?;
        if self.by_user.get(&user_id) == Some(&connection) {
            self.by_user.remove(&user_id);
        }
        Some(user_id)
    }

    /// Number of registered user ids
    pub fn len(&self) -> usize {
        self.by_user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }
}
