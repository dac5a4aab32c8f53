//! Room table: ordered peer indices per room.
//!
//! Indices are append-only. A departed peer leaves a tombstone so that an
//! index is never handed out twice for the same room record.

use super::SignalingError;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
struct Room {
    /// `None` marks a tombstoned slot
    slots: Vec<Option<String>>,
}

impl Room {
    fn live(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

/// Per-room occupancy, for stats
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomSummary {
    pub room_id: String,
    pub live: usize,
    pub total: usize,
}

#[derive(Debug, Default, Clone)]
pub struct RoomTable {
    rooms: HashMap<String, Room>,
}

impl RoomTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `user_id` to the room, creating it if unseen. Rejoining appends
    /// a duplicate entry with a fresh index.
    pub fn join_room(&mut self, room_id: &str, user_id: &str) -> usize {
        let room = self.rooms.entry(room_id.to_string()).or_default();
        room.slots.push(Some(user_id.to_string()));
        room.slots.len() - 1
    }

    pub fn resolve(&self, room_id: &str, index: usize) -> Result<&str, SignalingError> {
        let room = self.room(room_id)?;
        match room.slots.get(index) {
            Some(Some(user_id)) => Ok(user_id.as_str()),
            Some(None) => Err(SignalingError::NotFound(format!(
                "peer {} in room {} has left",
                index, room_id
            ))),
            None => Err(SignalingError::NotFound(format!(
                "no peer {} in room {}",
                index, room_id
            ))),
        }
    }

    /// First live index held by `user_id`
    pub fn index_of(&self, room_id: &str, user_id: &str) -> Result<usize, SignalingError> {
        let room = self.room(room_id)?;
        room.slots
            .iter()
            .position(|slot| slot.as_deref() == Some(user_id))
            .ok_or_else(|| {
                SignalingError::NotFound(format!("user {} is not in room {}", user_id, room_id))
            })
    }

    /// Tombstone every live slot of `user_id`, returning the indices. The room
    /// record is kept even with no live slots so its indices keep growing.
    pub fn leave_room(&mut self, room_id: &str, user_id: &str) -> Result<Vec<usize>, SignalingError> {
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| SignalingError::NotFound(format!("no room {}", room_id)))?;

        let mut indices = Vec::new();
        for (index, slot) in room.slots.iter_mut().enumerate() {
            if slot.as_deref() == Some(user_id) {
                *slot = None;
                indices.push(index);
            }
        }

        if indices.is_empty() {
            return Err(SignalingError::NotFound(format!(
                "user {} is not in room {}",
                user_id, room_id
            )));
        }

        Ok(indices)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn summaries(&self) -> Vec<RoomSummary> {
        let mut summaries: Vec<RoomSummary> = self
            .rooms
            .iter()
            .map(|(room_id, room)| RoomSummary {
                room_id: room_id.clone(),
                live: room.live(),
                total: room.slots.len(),
            })
            .collect();
        summaries.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        summaries
    }

    fn room(&self, room_id: &str) -> Result<&Room, SignalingError> {
        self.rooms
            .get(room_id)
            .ok_or_else(|| SignalingError::NotFound(format!("no room {}", room_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_follow_join_order() {
        let mut rooms = RoomTable::new();
        let users = ["a", "b", "a", "c", "a"];
        for (n, user) in users.iter().enumerate() {
            assert_eq!(rooms.join_room("study-1", user), n);
        }
        for (n, user) in users.iter().enumerate() {
            assert_eq!(rooms.resolve("study-1", n).unwrap(), *user);
        }
    }

    #[test]
    fn rooms_are_independent() {
        let mut rooms = RoomTable::new();
        assert_eq!(rooms.join_room("r1", "a"), 0);
        assert_eq!(rooms.join_room("r2", "b"), 0);
        assert_eq!(rooms.join_room("r1", "c"), 1);
        assert_eq!(rooms.len(), 2);
    }

    #[test]
    fn resolve_unknown_is_not_found() {
        let mut rooms = RoomTable::new();
        rooms.join_room("r1", "a");
        assert!(matches!(rooms.resolve("r2", 0), Err(SignalingError::NotFound(_))));
        assert!(matches!(rooms.resolve("r1", 1), Err(SignalingError::NotFound(_))));
    }

    #[test]
    fn index_of_returns_first_match() {
        let mut rooms = RoomTable::new();
        rooms.join_room("r", "a");
        rooms.join_room("r", "b");
        rooms.join_room("r", "b");
        assert_eq!(rooms.index_of("r", "b").unwrap(), 1);
        assert!(matches!(rooms.index_of("r", "z"), Err(SignalingError::NotFound(_))));
        assert!(matches!(rooms.index_of("nope", "a"), Err(SignalingError::NotFound(_))));
    }

    #[test]
    fn leave_tombstones_without_reuse() {
        let mut rooms = RoomTable::new();
        rooms.join_room("r", "a");
        rooms.join_room("r", "b");
        rooms.join_room("r", "a");

        assert_eq!(rooms.leave_room("r", "a").unwrap(), vec![0, 2]);
        assert!(matches!(rooms.resolve("r", 0), Err(SignalingError::NotFound(_))));
        assert_eq!(rooms.resolve("r", 1).unwrap(), "b");
        assert!(matches!(rooms.index_of("r", "a"), Err(SignalingError::NotFound(_))));

        // Next joiner still gets a fresh index
        assert_eq!(rooms.join_room("r", "a"), 3);
        assert_eq!(
            rooms.summaries(),
            vec![RoomSummary { room_id: "r".to_string(), live: 2, total: 4 }]
        );
    }

    #[test]
    fn emptied_room_keeps_counting() {
        let mut rooms = RoomTable::new();
        rooms.join_room("r", "a");
        assert_eq!(rooms.leave_room("r", "a").unwrap(), vec![0]);
        assert_eq!(rooms.len(), 1);
        assert!(matches!(rooms.leave_room("r", "a"), Err(SignalingError::NotFound(_))));

        assert_eq!(rooms.join_room("r", "b"), 1);
        assert!(matches!(rooms.resolve("r", 0), Err(SignalingError::NotFound(_))));
        assert_eq!(
            rooms.summaries(),
            vec![RoomSummary { room_id: "r".to_string(), live: 1, total: 2 }]
        );
    }
}
