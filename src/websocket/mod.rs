//! Hand-rolled RFC 6455 engine: upgrade handshake and frame codec. No I/O
//! beyond the `Read`/`Write` streams handed in by the caller.

pub mod codec;
pub mod constants;
pub mod frame;
pub mod frame_error;
pub mod handshake;
pub mod handshake_error;
pub mod opcode;

pub use codec::{
    FrameDecode, apply_mask, check_client_frame, decode_frame, encode, encode_frame,
    encode_masked_frame, read_frame, write_frame,
};
pub use frame::Frame;
pub use frame_error::FrameError;
pub use handshake::{
    HandshakeResponse, derive_accept_key, negotiate, read_request,
    read_request_within,
};
pub use handshake_error::HandshakeError;
pub use opcode::Opcode;
