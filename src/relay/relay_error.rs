use std::fmt;

use crate::relay::peer::PeerId;

/// Errors surfaced to callers that push messages at a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// The peer is not open (not yet upgraded, closing or closed).
    PeerClosed(PeerId),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerClosed(id) => write!(f, "peer {id} already closed"),
        }
    }
}

impl std::error::Error for RelayError {}
