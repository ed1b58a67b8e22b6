use std::fmt;

/// A text frame that is not a usable signaling envelope.
///
/// The only recoverable error: the message is dropped and the session stays open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageFormatError {
    InvalidJson(String),
    NotAnObject,
    MissingType,
}

impl fmt::Display for MessageFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJson(e) => write!(f, "invalid JSON: {e}"),
            Self::NotAnObject => write!(f, "message is not a JSON object"),
            Self::MissingType => write!(f, "message has no string \"type\" field"),
        }
    }
}

impl std::error::Error for MessageFormatError {}

impl From<serde_json::Error> for MessageFormatError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidJson(e.to_string())
    }
}
