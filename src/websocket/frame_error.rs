use std::{fmt, io};

/// Errors raised while reading or decoding a WebSocket frame.
///
/// Every variant is fatal to the session that produced it.
#[derive(Debug)]
pub enum FrameError {
    /// Socket failure mid-operation (reset, timeout, ...).
    Io(io::Error),
    /// The stream ended before a whole frame was read.
    ConnectionClosed,
    ReservedBitsSet(u8),
    UnknownOpcode(u8),
    /// A known opcode this relay does not carry (binary, continuation).
    UnsupportedOpcode(u8),
    /// FIN=0 data frame, or a fragmented control frame.
    Fragmented,
    UnmaskedClientFrame,
    InvalidUtf8,
    TooLarge { max: usize, declared: u64 },
    ControlFrameTooLarge(usize),
}

impl FrameError {
    /// True when the socket itself failed or closed, as opposed to the peer
    /// sending bytes that violate the protocol.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Io(_) | Self::ConnectionClosed)
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::ConnectionClosed => write!(f, "connection closed mid-frame"),
            Self::ReservedBitsSet(b) => write!(f, "reserved bits set in header byte {b:#04x}"),
            Self::UnknownOpcode(op) => write!(f, "unknown opcode {op:#x}"),
            Self::UnsupportedOpcode(op) => write!(f, "unsupported opcode {op:#x}"),
            Self::Fragmented => write!(f, "fragmented frames are not supported"),
            Self::UnmaskedClientFrame => write!(f, "client frame is not masked"),
            Self::InvalidUtf8 => write!(f, "text payload is not valid UTF-8"),
            Self::TooLarge { max, declared } => {
                write!(f, "frame payload of {declared} bytes exceeds limit of {max}")
            }
            Self::ControlFrameTooLarge(len) => {
                write!(f, "control frame payload of {len} bytes exceeds 125")
            }
        }
    }
}

impl std::error::Error for FrameError {}

impl From<io::Error> for FrameError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Self::ConnectionClosed
        } else {
            Self::Io(e)
        }
    }
}
