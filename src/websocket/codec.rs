use std::io::{self, Read, Write};

use byteorder::{BigEndian, ByteOrder};

use crate::websocket::constants::{
    FIN_BIT, LEN7_BITS, LEN16_MARKER, LEN64_MARKER, MASK_BIT, MASK_KEY_LEN, MAX_CONTROL_PAYLOAD,
    MAX_DIRECT_LEN, MAX_HEADER_LEN, OPCODE_BITS, RSV_BITS,
};
use crate::websocket::frame::Frame;
use crate::websocket::frame_error::FrameError;
use crate::websocket::opcode::Opcode;

/// Outcome of decoding from a byte buffer.
#[derive(Debug, PartialEq, Eq)]
pub enum FrameDecode {
    /// A whole frame was available; `consumed` bytes belong to it.
    Complete { frame: Frame, consumed: usize },
    /// The buffer holds only part of a frame. Nothing was consumed.
    NeedMoreData,
}

#[derive(Debug, Clone, Copy)]
struct FrameHeader {
    fin: bool,
    opcode: Opcode,
    mask: Option<[u8; MASK_KEY_LEN]>,
    payload_len: usize,
    header_len: usize,
}

// ---- Decode ---------------------------------------------------------------

/// Decode one frame from the front of `buf`.
///
/// The payload is returned only once all `payload_len` bytes declared by the
/// header are present; a partial frame yields `NeedMoreData`.
pub fn decode_frame(buf: &[u8], max_payload: usize) -> Result<FrameDecode, FrameError> {
    let Some(header) = parse_header(buf, max_payload)? else {
        return Ok(FrameDecode::NeedMoreData);
    };

    let total = header
        .header_len
        .checked_add(header.payload_len)
        .ok_or(FrameError::TooLarge {
            max: max_payload,
            declared: header.payload_len as u64,
        })?;
    if buf.len() < total {
        return Ok(FrameDecode::NeedMoreData);
    }

    let payload = buf[header.header_len..total].to_vec();
    let frame = finish_frame(header, payload)?;
    Ok(FrameDecode::Complete {
        frame,
        consumed: total,
    })
}

/// Read exactly one frame from a blocking stream.
///
/// A stream that ends anywhere inside the frame yields `FrameError::ConnectionClosed`.
pub fn read_frame<R: Read>(r: &mut R, max_payload: usize) -> Result<Frame, FrameError> {
    let mut header = [0u8; MAX_HEADER_LEN];

    r.read_exact(&mut header[..2])?;
    let header_len = header_len_for(header[1]);
    r.read_exact(&mut header[2..header_len])?;

    let Some(header) = parse_header(&header[..header_len], max_payload)? else {
        return Err(FrameError::ConnectionClosed);
    };

    let mut payload = vec![0u8; header.payload_len];
    r.read_exact(&mut payload)?;

    finish_frame(header, payload)
}

/// Total header size implied by the second header byte.
fn header_len_for(second: u8) -> usize {
    let ext = match second & LEN7_BITS {
        LEN16_MARKER => 2,
        LEN64_MARKER => 8,
        _ => 0,
    };
    let mask = if second & MASK_BIT != 0 {
        MASK_KEY_LEN
    } else {
        0
    };
    2 + ext + mask
}

fn parse_header(buf: &[u8], max_payload: usize) -> Result<Option<FrameHeader>, FrameError> {
    if buf.len() < 2 {
        return Ok(None);
    }
    let (first, second) = (buf[0], buf[1]);

    if first & RSV_BITS != 0 {
        return Err(FrameError::ReservedBitsSet(first));
    }
    let opcode = Opcode::from_u8(first & OPCODE_BITS)?;
    let fin = first & FIN_BIT != 0;

    let header_len = header_len_for(second);
    if buf.len() < header_len {
        return Ok(None);
    }

    let (declared, mut pos) = match second & LEN7_BITS {
        LEN16_MARKER => (u64::from(BigEndian::read_u16(&buf[2..4])), 4),
        LEN64_MARKER => (BigEndian::read_u64(&buf[2..10]), 10),
        n => (u64::from(n), 2),
    };

    if opcode.is_control() {
        if !fin {
            return Err(FrameError::Fragmented);
        }
        if declared > MAX_CONTROL_PAYLOAD as u64 {
            return Err(FrameError::ControlFrameTooLarge(
                usize::try_from(declared).unwrap_or(usize::MAX),
            ));
        }
    }

    let payload_len = usize::try_from(declared)
        .ok()
        .filter(|len| *len <= max_payload)
        .ok_or(FrameError::TooLarge {
            max: max_payload,
            declared,
        })?;

    let mask = if second & MASK_BIT != 0 {
        let mut key = [0u8; MASK_KEY_LEN];
        key.copy_from_slice(&buf[pos..pos + MASK_KEY_LEN]);
        pos += MASK_KEY_LEN;
        Some(key)
    } else {
        None
    };
    debug_assert_eq!(pos, header_len);

    Ok(Some(FrameHeader {
        fin,
        opcode,
        mask,
        payload_len,
        header_len,
    }))
}

fn finish_frame(header: FrameHeader, mut payload: Vec<u8>) -> Result<Frame, FrameError> {
    if let Some(key) = header.mask {
        apply_mask(&mut payload, key);
    }

    if header.opcode == Opcode::Text && header.fin && std::str::from_utf8(&payload).is_err() {
        return Err(FrameError::InvalidUtf8);
    }

    Ok(Frame {
        fin: header.fin,
        opcode: header.opcode,
        masked: header.mask.is_some(),
        payload,
    })
}

/// XOR every byte with `key[i % 4]`. Masking and unmasking are the same operation.
pub fn apply_mask(payload: &mut [u8], key: [u8; MASK_KEY_LEN]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= key[i % MASK_KEY_LEN];
    }
}

/// Enforce what the relay accepts from a client on top of the wire format:
/// masked frames (unless disabled) and unfragmented text or control frames.
pub fn check_client_frame(frame: &Frame, require_masked: bool) -> Result<(), FrameError> {
    if require_masked && !frame.masked {
        return Err(FrameError::UnmaskedClientFrame);
    }
    match frame.opcode {
        Opcode::Text if !frame.fin => Err(FrameError::Fragmented),
        Opcode::Text | Opcode::Close | Opcode::Ping | Opcode::Pong => Ok(()),
        Opcode::Binary | Opcode::Continuation => {
            Err(FrameError::UnsupportedOpcode(frame.opcode.as_u8()))
        }
    }
}

// ---- Encode ---------------------------------------------------------------

/// Server-to-client text frame: FIN set, unmasked, minimal length encoding.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    encode(Opcode::Text, payload)
}

/// Unmasked single frame with FIN set.
pub fn encode(opcode: Opcode, payload: &[u8]) -> Vec<u8> {
    encode_with(opcode, payload, None)
}

/// Client-to-server frame masked with `key`.
pub fn encode_masked_frame(opcode: Opcode, payload: &[u8], key: [u8; MASK_KEY_LEN]) -> Vec<u8> {
    encode_with(opcode, payload, Some(key))
}

/// Write one server frame and flush.
pub fn write_frame<W: Write>(w: &mut W, frame: &Frame) -> io::Result<()> {
    w.write_all(&encode(frame.opcode, &frame.payload))?;
    w.flush()
}

fn encode_with(opcode: Opcode, payload: &[u8], mask: Option<[u8; MASK_KEY_LEN]>) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAX_HEADER_LEN + payload.len());
    out.push(FIN_BIT | opcode.as_u8());

    let mask_bit = if mask.is_some() { MASK_BIT } else { 0 };
    let len = payload.len();
    if len <= MAX_DIRECT_LEN {
        out.push(mask_bit | len as u8);
    } else if let Ok(len16) = u16::try_from(len) {
        out.push(mask_bit | LEN16_MARKER);
        out.extend_from_slice(&len16.to_be_bytes());
    } else {
        out.push(mask_bit | LEN64_MARKER);
        out.extend_from_slice(&(len as u64).to_be_bytes());
    }

    match mask {
        Some(key) => {
            out.extend_from_slice(&key);
            let start = out.len();
            out.extend_from_slice(payload);
            apply_mask(&mut out[start..], key);
        }
        None => out.extend_from_slice(payload),
    }
    out
}
