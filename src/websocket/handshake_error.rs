use std::{fmt, io};

/// Failures while negotiating the HTTP upgrade. No frame is ever sent after one.
#[derive(Debug)]
pub enum HandshakeError {
    Io(io::Error),
    /// The peer hung up before finishing the request.
    ConnectionClosed,
    /// The full request did not arrive within the handshake timeout.
    TimedOut,
    RequestTooLarge { max: usize },
    MissingKey,
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::ConnectionClosed => write!(f, "connection closed during handshake"),
            Self::TimedOut => write!(f, "handshake not completed in time"),
            Self::RequestTooLarge { max } => {
                write!(f, "upgrade request exceeds {max} bytes")
            }
            Self::MissingKey => write!(f, "missing Sec-WebSocket-Key header"),
        }
    }
}

impl std::error::Error for HandshakeError {}

impl From<io::Error> for HandshakeError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Self::ConnectionClosed
        } else {
            Self::Io(e)
        }
    }
}
