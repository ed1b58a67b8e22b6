use crate::relay::relay_error::RelayError;

/// Internal identifier for a connected client.
pub type PeerId = u64;

/// What a room needs from a connection, whatever transport carries it.
///
/// The transport owns the receive side: it reads text messages and hands them
/// to [`Relay::relay_text`](crate::relay::relay::Relay::relay_text). Rooms only
/// ever push text back out through this trait.
pub trait Peer: Send + Sync {
    fn id(&self) -> PeerId;

    /// Queue `text` for delivery. An error means the peer is gone and should
    /// be dropped from its room.
    fn send_text(&self, text: &str) -> Result<(), RelayError>;
}
