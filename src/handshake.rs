//! WebSocket HTTP/1.1 upgrade handshake
//!
//! Parses the accumulated request bytes once the blank-line terminator
//! has arrived, validates the four required headers, and produces the
//! `101 Switching Protocols` response with the computed
//! `Sec-WebSocket-Accept` value.

use std::collections::HashMap;

use base64::Engine;
use bytes::{BufMut, Bytes, BytesMut};
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};
use crate::strutil;
use crate::WS_GUID;

/// Upper bound on the upgrade request (8 KiB covers any reasonable
/// browser request)
const MAX_REQUEST_SIZE: usize = 8192;

/// A validated WebSocket upgrade request
#[derive(Debug)]
pub struct UpgradeRequest {
    /// Request URI from the request line
    pub path: String,
    /// Raw `Sec-WebSocket-Key` value
    pub key: String,
    /// `Sec-WebSocket-Version` value
    pub version: String,
}

/// Parse and validate an upgrade request from the accumulated bytes.
///
/// Returns `Ok(None)` until the `\r\n\r\n` terminator has arrived. On
/// success, the returned length is the number of bytes the request
/// occupied; anything after it is already WebSocket frame data and
/// stays in the caller's buffer.
pub fn parse_upgrade(buf: &[u8]) -> Result<Option<(UpgradeRequest, usize)>> {
    let Some(end) = find_terminator(buf) else {
        if buf.len() > MAX_REQUEST_SIZE {
            return Err(Error::Handshake("request too large"));
        }
        return Ok(None);
    };
    let consumed = end + 4;

    let head =
        std::str::from_utf8(&buf[..end]).map_err(|_| Error::Handshake("request is not ASCII"))?;

    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let path = validate_request_line(request_line)?;

    // RFC 7230 section 3.2: field names are case-insensitive; values
    // keep their case but lose surrounding whitespace
    let mut fields: HashMap<String, &str> = HashMap::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(Error::Handshake("malformed header line"));
        };
        fields.insert(strutil::to_lower(strutil::trim(name)), strutil::trim(value));
    }

    validate_header_fields(&fields)?;

    let request = UpgradeRequest {
        path: path.to_string(),
        key: fields["sec-websocket-key"].to_string(),
        version: fields["sec-websocket-version"].to_string(),
    };
    Ok(Some((request, consumed)))
}

fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Validate `METHOD SP URI SP VERSION` and return the URI.
///
/// RFC 9110 section 9.1: the method is case-sensitive.
fn validate_request_line(line: &str) -> Result<&str> {
    let tokens = strutil::tokenize(line);
    if tokens.len() != 3 {
        return Err(Error::Handshake("malformed request line"));
    }
    if tokens[0] != "GET" {
        return Err(Error::Handshake("method must be GET"));
    }
    if tokens[2] != "HTTP/1.1" {
        return Err(Error::Handshake("version must be HTTP/1.1"));
    }
    Ok(tokens[1])
}

fn validate_header_fields(fields: &HashMap<String, &str>) -> Result<()> {
    let upgrade = fields
        .get("upgrade")
        .ok_or(Error::Handshake("missing Upgrade header"))?;
    if !upgrade.eq_ignore_ascii_case("websocket") {
        return Err(Error::Handshake("Upgrade header is not websocket"));
    }

    // Connection is a comma-separated token list, e.g.
    // "keep-alive, Upgrade"
    let connection = fields
        .get("connection")
        .ok_or(Error::Handshake("missing Connection header"))?;
    let has_upgrade_token = connection
        .split(',')
        .any(|token| strutil::trim(token).eq_ignore_ascii_case("upgrade"));
    if !has_upgrade_token {
        return Err(Error::Handshake("Connection header lacks Upgrade token"));
    }

    match fields.get("sec-websocket-version") {
        Some(v) if !v.is_empty() => {}
        _ => return Err(Error::Handshake("missing Sec-WebSocket-Version header")),
    }

    match fields.get("sec-websocket-key") {
        Some(v) if !v.is_empty() => {}
        _ => return Err(Error::Handshake("missing Sec-WebSocket-Key header")),
    }

    Ok(())
}

/// Compute the `Sec-WebSocket-Accept` value: base64(SHA-1(key ‖ GUID))
/// over the raw 20 digest bytes.
pub fn accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

/// Build the `101 Switching Protocols` response
pub fn build_response(accept: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(128);
    buf.put_slice(b"HTTP/1.1 101 Switching Protocols\r\n");
    buf.put_slice(b"Upgrade: websocket\r\n");
    buf.put_slice(b"Connection: Upgrade\r\n");
    buf.put_slice(b"Sec-WebSocket-Accept: ");
    buf.put_slice(accept.as_bytes());
    buf.put_slice(b"\r\n\r\n");
    buf.freeze()
}
