use crate::websocket::constants::{CLOSE_NORMAL, CLOSE_PROTOCOL_ERROR};
use crate::websocket::frame_error::FrameError;
use crate::websocket::opcode::Opcode;

/// One decoded WebSocket frame, payload already unmasked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub opcode: Opcode,
    /// Whether the frame arrived masked. Always false for frames we build.
    pub masked: bool,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn text(text: impl Into<String>) -> Self {
        Self::unmasked(Opcode::Text, text.into().into_bytes())
    }

    pub fn pong(payload: Vec<u8>) -> Self {
        Self::unmasked(Opcode::Pong, payload)
    }

    /// Close frame carrying a status code.
    pub fn close(code: u16) -> Self {
        Self::unmasked(Opcode::Close, code.to_be_bytes().to_vec())
    }

    fn unmasked(opcode: Opcode, payload: Vec<u8>) -> Self {
        Self {
            fin: true,
            opcode,
            masked: false,
            payload,
        }
    }

    /// Status code of a close frame; `CLOSE_NORMAL` when the peer sent none.
    pub fn close_code(&self) -> u16 {
        match self.payload.as_slice() {
            [hi, lo, ..] => u16::from_be_bytes([*hi, *lo]),
            _ => CLOSE_NORMAL,
        }
    }

    /// Status to answer this close frame with.
    ///
    /// Echoes the peer's code when it may legally appear on the wire; reserved
    /// codes (1004-1006, 1015, ...) and a lone status byte get a protocol error.
    pub fn reply_close_code(&self) -> u16 {
        match self.payload.as_slice() {
            [] => CLOSE_NORMAL,
            [_] => CLOSE_PROTOCOL_ERROR,
            [hi, lo, ..] => {
                let code = u16::from_be_bytes([*hi, *lo]);
                if is_sendable_close_code(code) {
                    code
                } else {
                    CLOSE_PROTOCOL_ERROR
                }
            }
        }
    }

    pub fn into_text(self) -> Result<String, FrameError> {
        String::from_utf8(self.payload).map_err(|_| FrameError::InvalidUtf8)
    }
}

/// Codes an endpoint may put in a close frame (RFC 6455 section 7.4).
fn is_sendable_close_code(code: u16) -> bool {
    matches!(code, 1000..=1003 | 1007..=1011 | 3000..=4999)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close_with_payload(payload: &[u8]) -> Frame {
        Frame {
            fin: true,
            opcode: Opcode::Close,
            masked: true,
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn valid_close_codes_are_echoed() {
        for code in [1000u16, 1001, 1003, 1008, 1011, 3000, 4999] {
            let mut payload = code.to_be_bytes().to_vec();
            payload.extend_from_slice(b"bye");
            assert_eq!(close_with_payload(&payload).reply_close_code(), code);
        }
    }

    #[test]
    fn reserved_codes_and_odd_payloads_get_protocol_error() {
        for code in [999u16, 1004, 1005, 1006, 1015, 2000, 5000] {
            assert_eq!(
                close_with_payload(&code.to_be_bytes()).reply_close_code(),
                CLOSE_PROTOCOL_ERROR,
                "code {code}"
            );
        }
        assert_eq!(close_with_payload(&[0x03]).reply_close_code(), CLOSE_PROTOCOL_ERROR);
        assert_eq!(close_with_payload(&[]).reply_close_code(), CLOSE_NORMAL);
    }
}
