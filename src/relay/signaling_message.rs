use serde_json::{Value, json};

use crate::relay::message_format_error::MessageFormatError;

pub const TYPE_WELCOME: &str = "welcome";
pub const TYPE_OFFER: &str = "offer";
pub const TYPE_ANSWER: &str = "answer";
pub const TYPE_ICE_CANDIDATE: &str = "ice-candidate";

/// The `type` of a signaling envelope. Unknown types are relayed opaquely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Welcome,
    Offer,
    Answer,
    IceCandidate,
    Other(String),
}

impl MessageKind {
    pub fn from_type(t: &str) -> Self {
        match t {
            TYPE_WELCOME => Self::Welcome,
            TYPE_OFFER => Self::Offer,
            TYPE_ANSWER => Self::Answer,
            TYPE_ICE_CANDIDATE => Self::IceCandidate,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Welcome => TYPE_WELCOME,
            Self::Offer => TYPE_OFFER,
            Self::Answer => TYPE_ANSWER,
            Self::IceCandidate => TYPE_ICE_CANDIDATE,
            Self::Other(t) => t,
        }
    }

    /// Offer and answer both carry an SDP body.
    pub fn carries_sdp(&self) -> bool {
        matches!(self, Self::Offer | Self::Answer)
    }
}

/// A decoded `{"type": ..., ...}` envelope.
///
/// Only `type` is interpreted; the relay forwards the original text, not this value.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalingMessage {
    pub kind: MessageKind,
    pub data: Value,
}

impl SignalingMessage {
    pub fn parse(text: &str) -> Result<Self, MessageFormatError> {
        let data: Value = serde_json::from_str(text)?;
        let obj = data.as_object().ok_or(MessageFormatError::NotAnObject)?;
        let kind = obj
            .get("type")
            .and_then(Value::as_str)
            .map(MessageKind::from_type)
            .ok_or(MessageFormatError::MissingType)?;
        Ok(Self { kind, data })
    }

    pub fn message_type(&self) -> &str {
        self.kind.as_str()
    }

    /// String field of the envelope, e.g. `sdp` or `candidate`.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.data.get(name).and_then(Value::as_str)
    }
}

/// Greeting sent to a client right after it joins a room.
pub fn welcome(encrypted: bool, clients_in_room: usize) -> String {
    json!({
        "type": TYPE_WELCOME,
        "encrypted": encrypted,
        "clients_in_room": clients_in_room,
    })
    .to_string()
}
