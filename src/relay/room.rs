use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex};

use crate::relay::peer::{Peer, PeerId};
use crate::utils::lock_or_recover;

pub type RoomId = String;

/// Result of one fan-out pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Members whose send failed; already removed from the room.
    pub dropped: Vec<PeerId>,
}

/// A named group of peers that receive each other's messages.
///
/// One mutex serializes join, leave and broadcast for this room only.
pub struct Room {
    id: RoomId,
    members: Mutex<HashMap<PeerId, Arc<dyn Peer>>>,
}

impl Room {
    pub fn new(id: impl Into<RoomId>) -> Self {
        Self {
            id: id.into(),
            members: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Add `peer`; a peer already present is left as is. Returns the member count.
    pub fn join(&self, peer: Arc<dyn Peer>) -> usize {
        self.join_with(peer, |_, _| {})
    }

    /// Like [`join`](Self::join), but a newly added peer is handed to `on_join`
    /// with the new count while the room is still locked. Whatever `on_join`
    /// sends reaches the peer before any broadcast does.
    pub fn join_with<F>(&self, peer: Arc<dyn Peer>, on_join: F) -> usize
    where
        F: FnOnce(&dyn Peer, usize),
    {
        let mut members = lock_or_recover(&self.members);
        let added = match members.entry(peer.id()) {
            Entry::Vacant(slot) => {
                slot.insert(peer.clone());
                true
            }
            Entry::Occupied(_) => false,
        };
        let count = members.len();
        if added {
            on_join(peer.as_ref(), count);
        }
        count
    }

    /// Remove `peer_id`; returns false if it was not a member.
    pub fn leave(&self, peer_id: PeerId) -> bool {
        lock_or_recover(&self.members).remove(&peer_id).is_some()
    }

    pub fn contains(&self, peer_id: PeerId) -> bool {
        lock_or_recover(&self.members).contains_key(&peer_id)
    }

    pub fn len(&self) -> usize {
        lock_or_recover(&self.members).len()
    }

    pub fn is_empty(&self) -> bool {
        lock_or_recover(&self.members).is_empty()
    }

    /// Member ids in ascending order.
    pub fn member_ids(&self) -> Vec<PeerId> {
        let mut ids: Vec<PeerId> = lock_or_recover(&self.members).keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Send `message` unchanged to every member except `origin`.
    ///
    /// Failed members are removed only after the pass over the membership, so
    /// every other member is visited exactly once.
    pub fn broadcast(&self, message: &str, origin: PeerId) -> BroadcastReport {
        let mut members = lock_or_recover(&self.members);
        let mut report = BroadcastReport::default();

        for (id, peer) in members.iter() {
            if *id == origin {
                continue;
            }
            match peer.send_text(message) {
                Ok(()) => report.delivered += 1,
                Err(_) => report.dropped.push(*id),
            }
        }

        for id in &report.dropped {
            members.remove(id);
        }
        report
    }
}
