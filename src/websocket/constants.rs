/// WebSocket wire constants (RFC 6455).
///
/// Frame header:
///   [FIN|RSV1-3|opcode: u8][MASK|len7: u8][ext len: 0, 2 or 8 B][mask key: 0 or 4 B]
/// Payload:
///   [payload bytes...], XOR-masked when MASK is set.
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

pub const FIN_BIT: u8 = 0x80;
pub const RSV_BITS: u8 = 0x70;
pub const OPCODE_BITS: u8 = 0x0F;
pub const MASK_BIT: u8 = 0x80;
pub const LEN7_BITS: u8 = 0x7F;

/// Largest payload length encoded directly in the 7-bit field.
pub const MAX_DIRECT_LEN: usize = 125;
/// 7-bit marker: a 16-bit big-endian length follows.
pub const LEN16_MARKER: u8 = 126;
/// 7-bit marker: a 64-bit big-endian length follows.
pub const LEN64_MARKER: u8 = 127;

pub const MASK_KEY_LEN: usize = 4;
/// Longest possible header: 2 + 8 (ext len) + 4 (mask key).
pub const MAX_HEADER_LEN: usize = 14;

/// Control frames (close/ping/pong) carry at most this many payload bytes.
pub const MAX_CONTROL_PAYLOAD: usize = 125;

/// Close status sent back when the peer closes without a code.
pub const CLOSE_NORMAL: u16 = 1000;
/// Close status sent back when the peer's close frame is malformed or uses a reserved code.
pub const CLOSE_PROTOCOL_ERROR: u16 = 1002;
