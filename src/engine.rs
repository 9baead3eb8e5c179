//! Per-connection protocol engine
//!
//! Sans-I/O state machine that turns the bytes of one connection into
//! protocol actions. [`Engine::advance`] consumes as much of the read
//! region as it can and appends every outgoing frame (the 101 response,
//! pongs, close replies, echoes) to the output buffer in the order it
//! was generated. The caller owns the socket: it feeds bytes in, writes
//! the output out, and tears the connection down when `advance` fails
//! or the close handshake completes.
//!
//! States: `TcpConnected` → `HttpUpgrade` on the first readable byte,
//! → `WebSocket` once the 101 response is queued, → `WebSocketClosing`
//! when a Close frame arrives. In the closing state, frames already
//! buffered are drained and discarded; no new frames are generated.

use bytes::BytesMut;

use crate::connection::ConnState;
use crate::error::{Error, Result};
use crate::frame::{self, Frame, OpCode};
use crate::generator;
use crate::{handshake, Config, CLOSE_NORMAL};

/// Protocol state machine for a single connection
pub struct Engine {
    state: ConnState,
    /// Opcode of the message being reassembled; `None` when not
    /// assembling
    fragment_opcode: Option<OpCode>,
    /// Accumulated fragment payloads; empty when not assembling
    fragment_buf: BytesMut,
    max_frame_size: usize,
    max_message_size: usize,
    close_sent: bool,
}

impl Engine {
    /// Create an engine for a freshly accepted connection
    pub fn new(config: &Config) -> Self {
        Self {
            state: ConnState::TcpConnected,
            fragment_opcode: None,
            fragment_buf: BytesMut::new(),
            max_frame_size: config.effective_max_frame_size(),
            max_message_size: config.max_message_size,
            close_sent: false,
        }
    }

    /// Current connection state
    #[inline]
    pub fn state(&self) -> ConnState {
        self.state
    }

    /// True once a Close frame has been sent or received; the caller
    /// should flush the output and close the socket.
    #[inline]
    pub fn is_closing(&self) -> bool {
        self.state == ConnState::WebSocketClosing
    }

    /// Process as much of `input` as possible.
    ///
    /// Appends outgoing wire bytes to `out` and returns how many input
    /// bytes were consumed. An error means the connection must be
    /// closed immediately, without sending anything further.
    pub fn advance(&mut self, input: &[u8], out: &mut BytesMut) -> Result<usize> {
        let mut consumed = 0;

        loop {
            let rest = &input[consumed..];
            match self.state {
                ConnState::TcpConnected => {
                    if rest.is_empty() {
                        return Ok(consumed);
                    }
                    // first readable byte: treat the stream as HTTP
                    self.state = ConnState::HttpUpgrade;
                }
                ConnState::HttpUpgrade => match handshake::parse_upgrade(rest)? {
                    None => return Ok(consumed),
                    Some((request, used)) => {
                        let accept = handshake::accept_key(&request.key);
                        out.extend_from_slice(&handshake::build_response(&accept));
                        tracing::info!(path = %request.path, "websocket upgrade complete");
                        self.state = ConnState::WebSocket;
                        consumed += used;
                    }
                },
                ConnState::WebSocket | ConnState::WebSocketClosing => {
                    match frame::parse(rest, self.max_frame_size)? {
                        None => return Ok(consumed),
                        Some(frame) => {
                            consumed += frame.total_size();
                            self.handle_frame(frame, out)?;
                        }
                    }
                }
            }
        }
    }

    fn handle_frame(&mut self, frame: Frame, out: &mut BytesMut) -> Result<()> {
        tracing::trace!(
            opcode = ?frame.opcode,
            fin = frame.fin,
            len = frame.payload_len,
            "frame received"
        );

        if self.state == ConnState::WebSocketClosing {
            // draining: nothing is answered, nothing is echoed
            tracing::trace!(opcode = ?frame.opcode, "discarding frame while closing");
            return Ok(());
        }

        match frame.opcode {
            OpCode::Close => {
                if !self.close_sent {
                    generator::encode_into(
                        out,
                        OpCode::Close,
                        &CLOSE_NORMAL.to_be_bytes(),
                        true,
                        None,
                    );
                    self.close_sent = true;
                }
                self.state = ConnState::WebSocketClosing;
                Ok(())
            }
            OpCode::Ping => {
                generator::encode_into(out, OpCode::Pong, &frame.payload, true, None);
                Ok(())
            }
            OpCode::Pong => {
                tracing::debug!(len = frame.payload_len, "ignoring unsolicited pong");
                Ok(())
            }
            OpCode::Text | OpCode::Binary => {
                if self.fragment_opcode.is_some() {
                    return Err(Error::Protocol("expected continuation frame"));
                }
                if frame.fin {
                    self.echo(frame.opcode, &frame.payload, out);
                } else {
                    if frame.payload.len() > self.max_message_size {
                        return Err(Error::MessageTooLarge);
                    }
                    self.fragment_opcode = Some(frame.opcode);
                    self.fragment_buf.extend_from_slice(&frame.payload);
                }
                Ok(())
            }
            OpCode::Continuation => {
                let opcode = self
                    .fragment_opcode
                    .ok_or(Error::Protocol("unexpected continuation frame"))?;

                if self.fragment_buf.len() + frame.payload.len() > self.max_message_size {
                    return Err(Error::MessageTooLarge);
                }
                self.fragment_buf.extend_from_slice(&frame.payload);

                if frame.fin {
                    let message = self.fragment_buf.split();
                    self.fragment_opcode = None;
                    self.echo(opcode, &message, out);
                }
                Ok(())
            }
        }
    }

    /// Echo handler: one unmasked final frame carrying the complete
    /// message. Empty messages are not echoed.
    fn echo(&self, opcode: OpCode, payload: &[u8], out: &mut BytesMut) {
        if payload.is_empty() {
            return;
        }
        tracing::debug!(opcode = ?opcode, len = payload.len(), "echoing message");
        generator::encode_into(out, opcode, payload, true, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UPGRADE: &[u8] = b"GET / HTTP/1.1\r\n\
        Host: localhost\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Sec-WebSocket-Version: 13\r\n\
        \r\n";

    fn upgraded_engine() -> Engine {
        let mut engine = Engine::new(&Config::default());
        let mut out = BytesMut::new();
        let consumed = engine.advance(UPGRADE, &mut out).unwrap();
        assert_eq!(consumed, UPGRADE.len());
        assert_eq!(engine.state(), ConnState::WebSocket);
        engine
    }

    #[test]
    fn upgrade_emits_101_with_accept_key() {
        let mut engine = Engine::new(&Config::default());
        let mut out = BytesMut::new();
        engine.advance(UPGRADE, &mut out).unwrap();

        let response = std::str::from_utf8(&out).unwrap();
        assert!(response.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(response.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
    }

    #[test]
    fn partial_request_consumes_nothing() {
        let mut engine = Engine::new(&Config::default());
        let mut out = BytesMut::new();

        let consumed = engine.advance(&UPGRADE[..10], &mut out).unwrap();
        assert_eq!(consumed, 0);
        assert_eq!(engine.state(), ConnState::HttpUpgrade);
        assert!(out.is_empty());

        // the same bytes plus the rest complete the handshake
        let consumed = engine.advance(UPGRADE, &mut out).unwrap();
        assert_eq!(consumed, UPGRADE.len());
        assert_eq!(engine.state(), ConnState::WebSocket);
    }

    #[test]
    fn invalid_upgrade_is_fatal() {
        let mut engine = Engine::new(&Config::default());
        let mut out = BytesMut::new();
        let request = b"POST / HTTP/1.1\r\nUpgrade: websocket\r\n\r\n";
        assert!(engine.advance(request, &mut out).is_err());
    }

    #[test]
    fn upgrade_and_first_frame_in_one_read() {
        let mut engine = Engine::new(&Config::default());
        let mut out = BytesMut::new();

        let mut input = UPGRADE.to_vec();
        input.extend_from_slice(&generator::text(b"hi", true, true));

        let consumed = engine.advance(&input, &mut out).unwrap();
        assert_eq!(consumed, input.len());
        assert!(out.ends_with(&[0x81, 0x02, b'h', b'i']));
    }

    #[test]
    fn echoes_text_frame() {
        let mut engine = upgraded_engine();
        let mut out = BytesMut::new();

        let input = generator::text(b"hello", true, true);
        let consumed = engine.advance(&input, &mut out).unwrap();
        assert_eq!(consumed, input.len());
        assert_eq!(out.as_ref(), [0x81, 0x05, b'h', b'e', b'l', b'l', b'o']);
    }

    #[test]
    fn echoes_binary_frame() {
        let mut engine = upgraded_engine();
        let mut out = BytesMut::new();

        engine
            .advance(&generator::binary(&[1, 2, 3], true, true), &mut out)
            .unwrap();
        assert_eq!(out.as_ref(), [0x82, 0x03, 1, 2, 3]);
    }

    #[test]
    fn empty_message_is_not_echoed() {
        let mut engine = upgraded_engine();
        let mut out = BytesMut::new();

        engine
            .advance(&generator::text(b"", true, true), &mut out)
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn reassembles_fragmented_message() {
        let mut engine = upgraded_engine();
        let mut out = BytesMut::new();

        let mut input = generator::text(b"hello", false, true).to_vec();
        input.extend_from_slice(&generator::continuation(b" world!", true, true));

        engine.advance(&input, &mut out).unwrap();
        let expected = generator::text(b"hello world!", true, false);
        assert_eq!(out.as_ref(), expected.as_ref());
    }

    #[test]
    fn fragments_across_advance_calls() {
        let mut engine = upgraded_engine();
        let mut out = BytesMut::new();

        engine
            .advance(&generator::text(b"a", false, true), &mut out)
            .unwrap();
        assert!(out.is_empty());
        engine
            .advance(&generator::continuation(b"b", false, true), &mut out)
            .unwrap();
        assert!(out.is_empty());
        engine
            .advance(&generator::continuation(b"c", true, true), &mut out)
            .unwrap();
        assert_eq!(out.as_ref(), [0x81, 0x03, b'a', b'b', b'c']);
    }

    #[test]
    fn ping_interleaved_with_fragments() {
        let mut engine = upgraded_engine();
        let mut out = BytesMut::new();

        let mut input = generator::text(b"first", false, true).to_vec();
        input.extend_from_slice(&generator::ping(b"p", true));
        input.extend_from_slice(&generator::continuation(b" second", false, true));
        input.extend_from_slice(&generator::continuation(b" third", true, true));

        engine.advance(&input, &mut out).unwrap();

        // pong first, then the reassembled echo
        let mut expected = generator::pong(b"p", false).to_vec();
        expected.extend_from_slice(&generator::text(b"first second third", true, false));
        assert_eq!(out.as_ref(), &expected[..]);
    }

    #[test]
    fn continuation_without_start_is_fatal() {
        let mut engine = upgraded_engine();
        let mut out = BytesMut::new();

        let result = engine.advance(&generator::continuation(b"x", true, true), &mut out);
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[test]
    fn new_data_frame_while_assembling_is_fatal() {
        let mut engine = upgraded_engine();
        let mut out = BytesMut::new();

        engine
            .advance(&generator::text(b"start", false, true), &mut out)
            .unwrap();
        let result = engine.advance(&generator::text(b"again", true, true), &mut out);
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[test]
    fn close_is_answered_once_and_transitions() {
        let mut engine = upgraded_engine();
        let mut out = BytesMut::new();

        let mut input = generator::close(1000, "", true).to_vec();
        input.extend_from_slice(&generator::close(1000, "", true));

        engine.advance(&input, &mut out).unwrap();
        assert!(engine.is_closing());
        assert_eq!(out.as_ref(), [0x88, 0x02, 0x03, 0xe8]);
    }

    #[test]
    fn frames_after_close_are_drained_silently() {
        let mut engine = upgraded_engine();
        let mut out = BytesMut::new();

        let mut input = generator::close(1000, "bye", true).to_vec();
        input.extend_from_slice(&generator::text(b"late", true, true));
        input.extend_from_slice(&generator::ping(b"p", true));

        let consumed = engine.advance(&input, &mut out).unwrap();
        assert_eq!(consumed, input.len());
        // only the close reply, no echo and no pong
        assert_eq!(out.as_ref(), [0x88, 0x02, 0x03, 0xe8]);
    }

    #[test]
    fn oversized_message_is_rejected() {
        let config = Config::builder().max_message_size(8).build();
        let mut engine = Engine::new(&config);
        engine.state = ConnState::WebSocket;
        let mut out = BytesMut::new();

        engine
            .advance(&generator::text(b"12345", false, true), &mut out)
            .unwrap();
        let result = engine.advance(&generator::continuation(b"6789a", true, true), &mut out);
        assert!(matches!(result, Err(Error::MessageTooLarge)));
    }

    #[test]
    fn invalid_frame_is_fatal_and_nothing_is_sent() {
        let mut engine = upgraded_engine();
        let mut out = BytesMut::new();

        // RSV1 set on a text frame
        let result = engine.advance(&[0xC1, 0x01, b'x'], &mut out);
        assert!(result.is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn partial_frame_consumes_nothing() {
        let mut engine = upgraded_engine();
        let mut out = BytesMut::new();

        let full = generator::text(b"hello", true, true);
        let consumed = engine.advance(&full[..3], &mut out).unwrap();
        assert_eq!(consumed, 0);

        let consumed = engine.advance(&full, &mut out).unwrap();
        assert_eq!(consumed, full.len());
    }
}
