//! WebSocket frame serialization
//!
//! Builders for every frame the server (or a test client) can send.
//! Headers use the minimal length encoding; masked frames draw their
//! key from the thread-local generator and mask the payload in place.
//! Server-to-client frames are never masked, so the server side always
//! passes `mask = false`.

use bytes::{BufMut, Bytes, BytesMut};

use crate::frame::OpCode;
use crate::mask::{apply_mask, generate_mask};
use crate::{CLOSE_NORMAL, MEDIUM_PAYLOAD_MAX, SMALL_PAYLOAD_MAX};

/// Append one frame to `buf`.
///
/// Pass a masking key to produce a client-to-server frame; the payload
/// is copied and masked in place.
pub fn encode_into(
    buf: &mut BytesMut,
    opcode: OpCode,
    payload: &[u8],
    fin: bool,
    mask_key: Option<[u8; 4]>,
) {
    let payload_len = payload.len();

    let header_size = 2
        + if payload_len > MEDIUM_PAYLOAD_MAX {
            8
        } else if payload_len > SMALL_PAYLOAD_MAX {
            2
        } else {
            0
        }
        + if mask_key.is_some() { 4 } else { 0 };
    buf.reserve(header_size + payload_len);

    let mut b0 = opcode as u8;
    if fin {
        b0 |= 0x80;
    }
    buf.put_u8(b0);

    let mask_bit = if mask_key.is_some() { 0x80 } else { 0x00 };
    if payload_len <= SMALL_PAYLOAD_MAX {
        buf.put_u8(mask_bit | payload_len as u8);
    } else if payload_len <= MEDIUM_PAYLOAD_MAX {
        buf.put_u8(mask_bit | 126);
        buf.put_u16(payload_len as u16);
    } else {
        buf.put_u8(mask_bit | 127);
        buf.put_u64(payload_len as u64);
    }

    if let Some(key) = mask_key {
        buf.put_slice(&key);
        let start = buf.len();
        buf.put_slice(payload);
        apply_mask(&mut buf[start..], key);
    } else {
        buf.put_slice(payload);
    }
}

fn build(opcode: OpCode, payload: &[u8], fin: bool, mask: bool) -> Bytes {
    let mut buf = BytesMut::new();
    let key = mask.then(generate_mask);
    encode_into(&mut buf, opcode, payload, fin, key);
    buf.freeze()
}

/// Build a text frame. `fin = false` starts or continues a fragmented
/// message.
pub fn text(payload: &[u8], fin: bool, mask: bool) -> Bytes {
    build(OpCode::Text, payload, fin, mask)
}

/// Build a binary frame
pub fn binary(payload: &[u8], fin: bool, mask: bool) -> Bytes {
    build(OpCode::Binary, payload, fin, mask)
}

/// Build a continuation frame
pub fn continuation(payload: &[u8], fin: bool, mask: bool) -> Bytes {
    build(OpCode::Continuation, payload, fin, mask)
}

/// Build a ping frame.
///
/// # Panics
///
/// Panics if the payload exceeds 125 bytes; that is a programming
/// error, not a runtime condition.
pub fn ping(payload: &[u8], mask: bool) -> Bytes {
    assert!(
        payload.len() <= SMALL_PAYLOAD_MAX,
        "ping payload cannot exceed 125 bytes"
    );
    build(OpCode::Ping, payload, true, mask)
}

/// Build a pong frame, usually echoing a ping payload.
///
/// # Panics
///
/// Panics if the payload exceeds 125 bytes.
pub fn pong(payload: &[u8], mask: bool) -> Bytes {
    assert!(
        payload.len() <= SMALL_PAYLOAD_MAX,
        "pong payload cannot exceed 125 bytes"
    );
    build(OpCode::Pong, payload, true, mask)
}

/// Build a close frame: big-endian code followed by the reason bytes.
///
/// # Panics
///
/// Panics if `2 + reason.len()` exceeds 125 bytes.
pub fn close(code: u16, reason: &str, mask: bool) -> Bytes {
    assert!(
        2 + reason.len() <= SMALL_PAYLOAD_MAX,
        "close payload (code + reason) cannot exceed 125 bytes"
    );
    let mut payload = Vec::with_capacity(2 + reason.len());
    payload.extend_from_slice(&code.to_be_bytes());
    payload.extend_from_slice(reason.as_bytes());
    build(OpCode::Close, &payload, true, mask)
}

/// Build a close frame with the default code (1000) and no reason
pub fn close_normal(mask: bool) -> Bytes {
    close(CLOSE_NORMAL, "", mask)
}
