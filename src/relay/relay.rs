use std::sync::Arc;

use crate::audit::AuditLog;
use crate::log::log_sink::LogSink;
use crate::relay::message_format_error::MessageFormatError;
use crate::relay::peer::{Peer, PeerId};
use crate::relay::room::{BroadcastReport, Room};
use crate::relay::room_registry::RoomRegistry;
use crate::relay::signaling_message::{SignalingMessage, welcome};
use crate::{sink_debug, sink_info, sink_warn};

/// Transport-agnostic relay core: rooms, fan-out and the audit trail.
///
/// Sessions feed it decoded text and hand it their `Peer`; it never touches a socket.
pub struct Relay {
    registry: RoomRegistry,
    audit: Arc<AuditLog>,
    encrypted: bool,
    log: Arc<dyn LogSink>,
}

impl Relay {
    pub fn new(audit: Arc<AuditLog>, encrypted: bool, log: Arc<dyn LogSink>) -> Self {
        Self {
            registry: RoomRegistry::new(),
            audit,
            encrypted,
            log,
        }
    }

    /// Put `peer` in `room_id` and greet it with the current member count.
    ///
    /// The welcome is queued under the room lock, so it is the first thing the
    /// newcomer receives and its count is exact.
    pub fn join(&self, room_id: &str, peer: Arc<dyn Peer>) -> Arc<Room> {
        let room = self.registry.get_or_create(room_id);
        let id = peer.id();
        let count = room.join_with(peer, |p, n| {
            if let Err(e) = p.send_text(&welcome(self.encrypted, n)) {
                sink_warn!(self.log, "welcome to client {} not delivered: {}", id, e);
            }
        });
        sink_info!(
            self.log,
            "client {} joined room {} ({} clients)",
            id,
            room_id,
            count
        );
        room
    }

    /// Handle one text message from `origin`: audit it, then forward the
    /// original text unchanged to the rest of the room.
    ///
    /// Malformed messages are logged and neither audited nor forwarded.
    pub fn relay_text(
        &self,
        room: &Room,
        origin: PeerId,
        text: &str,
    ) -> Result<BroadcastReport, MessageFormatError> {
        let message = match SignalingMessage::parse(text) {
            Ok(m) => m,
            Err(e) => {
                sink_warn!(
                    self.log,
                    "dropping message from client {} in room {}: {}",
                    origin,
                    room.id(),
                    e
                );
                return Err(e);
            }
        };

        sink_debug!(
            self.log,
            "{} from client {} in room {}",
            message.message_type(),
            origin,
            room.id()
        );
        self.audit
            .record(message.message_type(), room.id(), &message.data);

        let report = room.broadcast(text, origin);
        for id in &report.dropped {
            sink_info!(
                self.log,
                "client {} dropped from room {} (send failed)",
                id,
                room.id()
            );
        }
        Ok(report)
    }

    /// Remove `peer_id` from `room`; harmless if it already left.
    pub fn leave(&self, room: &Room, peer_id: PeerId) {
        if room.leave(peer_id) {
            sink_info!(
                self.log,
                "client {} left room {} ({} clients)",
                peer_id,
                room.id(),
                room.len()
            );
        }
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub fn encrypted(&self) -> bool {
        self.encrypted
    }
}
