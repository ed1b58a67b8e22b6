use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::relay::room::{Room, RoomId};
use crate::utils::lock_or_recover;

/// All rooms known to the relay, created lazily on first use.
///
/// The registry lock only covers lookup; membership is locked per room.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: Mutex<HashMap<RoomId, Arc<Room>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, room_id: &str) -> Arc<Room> {
        lock_or_recover(&self.rooms)
            .entry(room_id.to_string())
            .or_insert_with(|| Arc::new(Room::new(room_id)))
            .clone()
    }

    pub fn get(&self, room_id: &str) -> Option<Arc<Room>> {
        lock_or_recover(&self.rooms).get(room_id).cloned()
    }

    pub fn room_ids(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = lock_or_recover(&self.rooms).keys().cloned().collect();
        ids.sort();
        ids
    }
}
