/// Lifecycle of one client connection.
///
/// `Connecting → Handshaking → Open → Closing → Closed`; a failed handshake
/// goes from `Handshaking` straight to `Closed`.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionState {
    Connecting = 0,
    Handshaking = 1,
    Open = 2,
    Closing = 3,
    Closed = 4,
}

impl SessionState {
    pub fn from_u8(v: u8) -> SessionState {
        use SessionState::*;
        match v {
            0 => Connecting,
            1 => Handshaking,
            2 => Open,
            3 => Closing,
            _ => Closed,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Closing or Closed.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closing | SessionState::Closed)
    }
}
